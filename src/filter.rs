//! Optional pre-export date filter
//!
//! Narrows the report by a date criterion before the export is triggered.
//! A missing filter control is not a failure of the flow: retrieval can
//! proceed unfiltered, so the stage reports "skipped" instead of erroring.

use crate::browser;
use crate::config::Config;
use crate::error::AutomationError;
use chromiumoxide::page::Page;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Date criterion consumed before export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterCriteria {
    pub date: NaiveDate,
}

impl FilterCriteria {
    /// Parse an ISO `YYYY-MM-DD` date as passed on the admin surface.
    pub fn parse(input: &str) -> Result<Self, AutomationError> {
        let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
            AutomationError::InvalidConfiguration(format!(
                "invalid filter date '{input}', expected YYYY-MM-DD"
            ))
        })?;
        Ok(Self { date })
    }

    /// Value written into the target's filter field.
    pub fn field_value(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// How long to look for the filter field before declaring the filter skipped.
/// Deliberately short: an absent control is an expected layout variation.
const FILTER_FIELD_WAIT: Duration = Duration::from_secs(5);

pub struct FilterStage {
    config: Arc<Config>,
}

impl FilterStage {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Apply the date criterion to the current report view.
    ///
    /// Returns `Ok(true)` when the filter was applied and the view refreshed,
    /// `Ok(false)` when the filter or refresh control could not be located.
    pub async fn apply(
        &self,
        page: &Page,
        criteria: &FilterCriteria,
    ) -> Result<bool, AutomationError> {
        let target = &self.config.target;

        if browser::wait_for_element(page, &target.filter_field_selector, FILTER_FIELD_WAIT)
            .await
            .is_err()
        {
            warn!(
                selector = %target.filter_field_selector,
                "filter field not found, proceeding unfiltered"
            );
            return Ok(false);
        }

        let selector_json = serde_json::to_string(&target.filter_field_selector)
            .map_err(|e| AutomationError::Page(e.to_string()))?;
        let value_json = serde_json::to_string(&criteria.field_value())
            .map_err(|e| AutomationError::Page(e.to_string()))?;

        // The target's report widget only reacts to input/change events, not
        // to a bare value assignment.
        let script = format!(
            r#"
            (function() {{
                const el = document.querySelector({selector_json});
                if (!el) return false;
                el.focus();
                el.value = {value_json};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#
        );

        let written: bool = page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| AutomationError::Page(e.to_string()))?;
        if !written {
            warn!("filter field vanished before the value was written, proceeding unfiltered");
            return Ok(false);
        }

        match page.find_element(&target.filter_refresh_selector).await {
            Ok(refresh) => {
                refresh
                    .click()
                    .await
                    .map_err(|e| AutomationError::Page(e.to_string()))?;
            }
            Err(_) => {
                warn!(
                    selector = %target.filter_refresh_selector,
                    "refresh control not found, proceeding unfiltered"
                );
                return Ok(false);
            }
        }

        tokio::time::sleep(self.config.timeouts.filter_settle).await;
        debug!(date = %criteria.field_value(), "filter applied");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_date() {
        let criteria = FilterCriteria::parse("2024-01-15").unwrap();
        assert_eq!(criteria.field_value(), "2024-01-15");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let criteria = FilterCriteria::parse(" 2024-01-15 ").unwrap();
        assert_eq!(criteria.field_value(), "2024-01-15");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(FilterCriteria::parse("15/01/2024").is_err());
        assert!(FilterCriteria::parse("2024-13-01").is_err());
        assert!(FilterCriteria::parse("").is_err());
    }
}
