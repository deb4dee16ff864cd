//! Credential sets identifying the logical actors on the target application

use serde::{Deserialize, Serialize};

/// A username/password pair identifying one logical actor on the target
/// application
///
/// Immutable once constructed. The `id` keys the session registry: every
/// credential set owns at most one live browser session at a time, and flows
/// for distinct ids run fully in parallel.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialSet {
    /// Registry key, e.g. "primary" or "alternate"
    pub id: String,

    /// Login username
    pub username: String,

    /// Login password
    pub password: String,
}

impl CredentialSet {
    pub fn new(id: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether both login fields are populated.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

// Manual Debug so passwords never reach log output.
impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
