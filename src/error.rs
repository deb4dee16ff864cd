use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AutomationError {
    #[error("login rejected for credential set '{0}'")]
    Authentication(String),

    #[error("session expired: authenticated marker no longer present")]
    SessionExpired,

    #[error("element '{selector}' not found within {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("export triggered but no file arrived within {0:?}")]
    DownloadTimeout(Duration),

    #[error("upload failed (status {status:?}): {message}")]
    Upload { status: Option<u16>, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("page interaction failed: {0}")]
    Page(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("unknown credential set '{0}'")]
    UnknownCredentialSet(String),

    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
}

impl AutomationError {
    /// Label used for failure counters, one per taxonomy bucket.
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationError::Authentication(_) => "authentication",
            AutomationError::SessionExpired => "session_expired",
            AutomationError::ElementNotFound { .. } => "element_not_found",
            AutomationError::DownloadTimeout(_) => "download_timeout",
            AutomationError::Upload { .. } => "upload",
            AutomationError::Filesystem(_) => "filesystem",
            AutomationError::BrowserLaunch(_) => "browser_launch",
            AutomationError::Page(_) => "page",
            AutomationError::Navigation(_) => "navigation",
            AutomationError::SessionClosed => "session_closed",
            AutomationError::UnknownCredentialSet(_) => "unknown_credential_set",
            AutomationError::InvalidConfiguration(_) => "configuration",
        }
    }

    /// Whether the session that produced this error must be torn down.
    ///
    /// Only a rejected login discards the session; every other failure leaves
    /// it open so a later call can attempt recovery without a full re-login.
    pub fn discards_session(&self) -> bool {
        matches!(
            self,
            AutomationError::Authentication(_) | AutomationError::BrowserLaunch(_)
        )
    }
}

impl From<std::io::Error> for AutomationError {
    fn from(err: std::io::Error) -> Self {
        AutomationError::Filesystem(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for AutomationError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AutomationError::Page(err.to_string())
    }
}

impl From<reqwest::Error> for AutomationError {
    fn from(err: reqwest::Error) -> Self {
        AutomationError::Upload {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
