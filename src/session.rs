//! Login state machine for one persistent browser session
//!
//! A `Session` owns the browser process, its CDP handler task, and at most
//! one page, all tied to a single credential set. State transitions:
//! `Unauthenticated → Authenticating → Authenticated → Expired →
//! Authenticating → …`, with `Closed` terminal from any state. Callers never
//! touch a `Session` directly; the session manager serializes access per
//! credential set.

use crate::behavior::HumanBehavior;
use crate::browser::{self, HandlerTask};
use crate::config::{Config, ExpiredPolicy};
use crate::credentials::CredentialSet;
use crate::error::AutomationError;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Expired,
    Closed,
}

/// Point-in-time view of a session, as reported to the admin adapter
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub browser_active: bool,
    pub page_active: bool,
    pub is_logged_in: bool,
    pub current_page_url: Option<String>,
}

impl SessionStatus {
    /// Status reported for a credential set with no live session.
    pub fn inactive() -> Self {
        Self {
            browser_active: false,
            page_active: false,
            is_logged_in: false,
            current_page_url: None,
        }
    }
}

pub struct Session {
    credential_id: String,
    browser: Browser,
    handler: HandlerTask,
    page: Option<Page>,
    state: LoginState,
    last_known_url: Option<String>,
}

impl Session {
    /// Launch the browser for a credential set. No login is attempted yet.
    pub async fn open(credential_id: &str, config: &Config) -> Result<Self, AutomationError> {
        info!(credential = credential_id, "launching browser session");
        let (browser, handler) = browser::launch_browser(&config.browser).await?;

        Ok(Self {
            credential_id: credential_id.to_string(),
            browser,
            handler,
            page: None,
            state: LoginState::Unauthenticated,
            last_known_url: None,
        })
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == LoginState::Authenticated
    }

    pub fn page(&self) -> Result<&Page, AutomationError> {
        self.page.as_ref().ok_or(AutomationError::SessionClosed)
    }

    /// Bring this session into the `Authenticated` state.
    ///
    /// Returns `Ok(true)` when an existing login was reused, `Ok(false)` when
    /// a full login ran. The reuse probe queries the current DOM snapshot for
    /// the authenticated marker; it never navigates, so a valid session is
    /// not disturbed just to be checked.
    pub async fn ensure_authenticated(
        &mut self,
        credentials: &CredentialSet,
        config: &Config,
        behavior: &HumanBehavior,
    ) -> Result<bool, AutomationError> {
        if self.state == LoginState::Closed {
            return Err(AutomationError::SessionClosed);
        }

        if let Some(page) = &self.page {
            if browser::element_exists(page, &config.target.marker_selector).await {
                debug!(
                    credential = %self.credential_id,
                    "authenticated marker present, reusing session"
                );
                self.refresh_view(config).await?;
                self.state = LoginState::Authenticated;
                return Ok(true);
            }

            if self.state == LoginState::Authenticated {
                warn!(
                    credential = %self.credential_id,
                    "authenticated marker missing, session expired"
                );
                self.state = LoginState::Expired;
                if config.expired_policy == ExpiredPolicy::Surface {
                    return Err(AutomationError::SessionExpired);
                }
            }
        }

        self.login(credentials, config, behavior).await?;
        Ok(false)
    }

    /// Run the full login sequence against the target's login form.
    async fn login(
        &mut self,
        credentials: &CredentialSet,
        config: &Config,
        behavior: &HumanBehavior,
    ) -> Result<(), AutomationError> {
        self.state = LoginState::Authenticating;
        info!(credential = %self.credential_id, "running login sequence");

        if self.page.is_none() {
            self.page = Some(browser::new_stealth_page(&self.browser).await?);
        }
        let page = self.page.as_ref().ok_or(AutomationError::SessionClosed)?;

        browser::navigate(page, &config.target.login_url, config.timeouts.navigation).await?;

        behavior.pause().await;
        behavior.scroll_gesture(page).await;
        type_into(
            page,
            &config.target.username_selector,
            &credentials.username,
            config,
            behavior,
        )
        .await?;

        behavior.pause().await;
        type_into(
            page,
            &config.target.password_selector,
            &credentials.password,
            config,
            behavior,
        )
        .await?;

        behavior.pause().await;
        let submit = browser::wait_for_element(
            page,
            &config.target.submit_selector,
            config.timeouts.element_wait,
        )
        .await?;
        submit
            .click()
            .await
            .map_err(|e| AutomationError::Page(e.to_string()))?;

        match browser::wait_for_element(
            page,
            &config.target.marker_selector,
            config.timeouts.login_wait,
        )
        .await
        {
            Ok(_) => {
                self.last_known_url = page.url().await.ok().flatten();
                self.state = LoginState::Authenticated;
                info!(
                    credential = %self.credential_id,
                    url = ?self.last_known_url,
                    "login succeeded"
                );
                Ok(())
            }
            Err(_) => {
                self.state = LoginState::Unauthenticated;
                Err(AutomationError::Authentication(self.credential_id.clone()))
            }
        }
    }

    /// Reload the current view so a reused session serves fresh data.
    async fn refresh_view(&self, config: &Config) -> Result<(), AutomationError> {
        let page = self.page()?;

        tokio::time::timeout(config.timeouts.navigation, page.reload())
            .await
            .map_err(|_| AutomationError::Navigation("timed out reloading view".to_string()))?
            .map_err(|e| AutomationError::Navigation(e.to_string()))?;

        Ok(())
    }

    pub async fn status(&self) -> SessionStatus {
        let current_page_url = match &self.page {
            Some(page) => page
                .url()
                .await
                .ok()
                .flatten()
                .or_else(|| self.last_known_url.clone()),
            None => self.last_known_url.clone(),
        };

        SessionStatus {
            browser_active: self.state != LoginState::Closed && !self.handler.is_finished(),
            page_active: self.page.is_some(),
            is_logged_in: self.state == LoginState::Authenticated,
            current_page_url,
        }
    }

    /// Release the browser process. Terminal; the session cannot be reused.
    pub async fn close(mut self) {
        info!(credential = %self.credential_id, "closing browser session");
        self.state = LoginState::Closed;
        self.page = None;
        let _ = self.browser.close().await;
        self.handler.abort();
    }
}

/// Focus a field and type its value one keystroke at a time.
async fn type_into(
    page: &Page,
    selector: &str,
    text: &str,
    config: &Config,
    behavior: &HumanBehavior,
) -> Result<(), AutomationError> {
    let field = browser::wait_for_element(page, selector, config.timeouts.element_wait).await?;
    field
        .click()
        .await
        .map_err(|e| AutomationError::Page(e.to_string()))?;

    for ch in text.chars() {
        field
            .type_str(ch.to_string())
            .await
            .map_err(|e| AutomationError::Page(e.to_string()))?;
        behavior.keystroke_pause().await;
    }

    Ok(())
}
