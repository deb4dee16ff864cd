//! Configuration management with serde serialization/deserialization
//!
//! This module provides all configuration structures for the relay service:
//! target-application affordances, browser launch settings, download and
//! dispatch parameters, interaction timeouts, and credential sets.

use crate::credentials::CredentialSet;
use crate::error::AutomationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the relay service
///
/// # Examples
///
/// ```rust
/// use report_relay::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     browser: report_relay::BrowserSettings {
///         headless: false,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Affordances of the target web application
    pub target: TargetConfig,

    /// Browser launch settings
    pub browser: BrowserSettings,

    /// Artifact download settings
    pub download: DownloadConfig,

    /// Downstream dispatch settings
    pub dispatch: DispatchConfig,

    /// Human-behavior simulation bounds
    pub behavior: BehaviorConfig,

    /// Per-operation interaction timeouts
    pub timeouts: Timeouts,

    /// Credential sets the service may drive sessions for
    pub credentials: Vec<CredentialSet>,

    /// What to do when an authenticated session turns out to be expired
    pub expired_policy: ExpiredPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            browser: BrowserSettings::default(),
            download: DownloadConfig::default(),
            dispatch: DispatchConfig::default(),
            behavior: BehaviorConfig::default(),
            timeouts: Timeouts::default(),
            credentials: vec![
                CredentialSet::new("primary", "", ""),
                CredentialSet::new("alternate", "", ""),
            ],
            expired_policy: ExpiredPolicy::Relogin,
        }
    }
}

impl Config {
    /// Look up a configured credential set by id.
    pub fn credential(&self, id: &str) -> Option<&CredentialSet> {
        self.credentials.iter().find(|c| c.id == id)
    }

    /// Structural validation, run once at startup and by the `validate` command.
    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.target.login_url.is_empty() {
            return Err(AutomationError::InvalidConfiguration(
                "target.login_url must not be empty".to_string(),
            ));
        }

        url::Url::parse(&self.dispatch.endpoint).map_err(|e| {
            AutomationError::InvalidConfiguration(format!(
                "dispatch.endpoint is not a valid URL: {e}"
            ))
        })?;

        if self.download.file_prefix.is_empty() {
            return Err(AutomationError::InvalidConfiguration(
                "download.file_prefix must not be empty".to_string(),
            ));
        }

        if self.behavior.min_delay_ms > self.behavior.max_delay_ms {
            return Err(AutomationError::InvalidConfiguration(
                "behavior.min_delay_ms must not exceed behavior.max_delay_ms".to_string(),
            ));
        }

        if self.timeouts.element_wait.is_zero()
            || self.timeouts.download.is_zero()
            || self.timeouts.navigation.is_zero()
            || self.timeouts.upload.is_zero()
        {
            return Err(AutomationError::InvalidConfiguration(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for credential in &self.credentials {
            if credential.id.is_empty() {
                return Err(AutomationError::InvalidConfiguration(
                    "credential sets must have a non-empty id".to_string(),
                ));
            }
            if !seen.insert(credential.id.as_str()) {
                return Err(AutomationError::InvalidConfiguration(format!(
                    "duplicate credential set id '{}'",
                    credential.id
                )));
            }
        }

        Ok(())
    }
}

/// The four affordances the core relies on in the target application:
/// login form, authenticated marker, export control, optional date filter.
///
/// All selectors are plain CSS. Defaults match the deployment this service
/// was written for and are expected to be overridden per environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Login form URL
    pub login_url: String,

    /// Username input selector
    pub username_selector: String,

    /// Password input selector
    pub password_selector: String,

    /// Login submit control selector
    pub submit_selector: String,

    /// Element present only when a session is authenticated
    pub marker_selector: String,

    /// Control that triggers the report export
    pub export_selector: String,

    /// Date filter input selector
    pub filter_field_selector: String,

    /// Control that refreshes the report after the filter changes
    pub filter_refresh_selector: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            login_url: "https://apppro.bcp.com.bo/Multiplica/AuthIAM/Index".to_string(),
            username_selector: "#authname".to_string(),
            password_selector: "#authpass".to_string(),
            submit_selector: "#authbtn".to_string(),
            marker_selector: "button[title=\"Exportar a Excel\"]".to_string(),
            export_selector: "button[title=\"Exportar a Excel\"]".to_string(),
            filter_field_selector: "#filterdate".to_string(),
            filter_refresh_selector: "#refreshbtn".to_string(),
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserSettings {
    /// Run Chromium headless (default: true)
    pub headless: bool,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string (default: Chrome default)
    ///
    /// A desktop user agent reduces the automation fingerprint of a headless
    /// launch; some targets reject the default HeadlessChrome token outright.
    pub user_agent: Option<String>,

    /// Viewport width in pixels (default: 1366)
    pub width: u32,

    /// Viewport height in pixels (default: 768)
    pub height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            width: 1366,
            height: 768,
        }
    }
}

/// Artifact download settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Directory receiving artifacts and diagnostic screenshots.
    ///
    /// Created on startup if missing. Shared by all sessions; timestamped
    /// filenames keep concurrent flows from colliding.
    pub directory: PathBuf,

    /// Artifact filename prefix (`<prefix>_<epoch-ms>.xlsx`)
    pub file_prefix: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("descargas"),
            file_prefix: "Reporte".to_string(),
        }
    }
}

/// Downstream dispatch settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Ingestion endpoint receiving the multipart upload.
    ///
    /// This is the startup default; the running service can be repointed at
    /// any time without a restart.
    pub endpoint: String,

    /// Keep local artifacts regardless of dispatch outcome (default: false)
    ///
    /// The default configuration deletes an artifact once the downstream
    /// endpoint accepts it. Diagnostic deployments set this to retain every
    /// file for inspection.
    pub retain_artifacts: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/movimientos/importar".to_string(),
            retain_artifacts: false,
        }
    }
}

/// Human-behavior simulation bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BehaviorConfig {
    /// Lower bound of a randomized pause in milliseconds (default: 200)
    pub min_delay_ms: u64,

    /// Upper bound of a randomized pause in milliseconds (default: 1200)
    ///
    /// Hard cap; a pause never sleeps past this value.
    pub max_delay_ms: u64,

    /// Emit a small scroll gesture during login (default: true)
    pub scroll_jitter: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 1200,
            scroll_jitter: true,
        }
    }
}

/// Per-operation interaction timeouts
///
/// Every browser interaction the service performs is bounded by one of
/// these; expiry always surfaces as a typed error, never a silent stall.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timeouts {
    /// Page navigation, including the login form load (default: 60s)
    pub navigation: Duration,

    /// Wait for an expected control to appear (default: 30s)
    pub element_wait: Duration,

    /// Wait for the authenticated marker after submitting login (default: 20s)
    pub login_wait: Duration,

    /// Wait for the exported file after triggering the export control
    /// (default: 60s, covers server-side report generation)
    pub download: Duration,

    /// Settle time after applying the date filter (default: 3s)
    pub filter_settle: Duration,

    /// Downstream upload round trip (default: 60s)
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            element_wait: Duration::from_secs(30),
            login_wait: Duration::from_secs(20),
            download: Duration::from_secs(60),
            filter_settle: Duration::from_secs(3),
            upload: Duration::from_secs(60),
        }
    }
}

/// Policy applied when the authenticated marker is gone from a session that
/// previously logged in successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredPolicy {
    /// Re-run the login sequence transparently
    Relogin,
    /// Surface the expiry as an error for the caller to handle
    Surface,
}

/// Generate Chromium command-line arguments for an automation session
///
/// Combines the flags required to run inside containers with the
/// anti-detection set: headless Chromium advertises itself through a handful
/// of switches and properties that login pages increasingly check for.
pub fn get_chrome_args(settings: &BrowserSettings) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        format!("--window-size={},{}", settings.width, settings.height),
    ];

    if let Some(user_agent) = &settings.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

/// Build the chromiumoxide launch configuration from browser settings
pub fn create_browser_config(
    settings: &BrowserSettings,
) -> Result<chromiumoxide::browser::BrowserConfig, AutomationError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(settings.width, settings.height)
        .args(get_chrome_args(settings));

    // chromiumoxide launches headless unless told otherwise
    if !settings.headless {
        builder = builder.with_head();
    }

    if let Some(chrome_path) = &settings.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(AutomationError::BrowserLaunch)
}
