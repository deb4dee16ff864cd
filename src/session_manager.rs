//! Session ownership keyed by credential set
//!
//! One persistent `Session` per credential set, held behind a per-set async
//! mutex. A flow leases the slot for its whole duration, so two flows for
//! the same credential set can never race on one page, while distinct
//! credential sets run fully in parallel.

use crate::behavior::HumanBehavior;
use crate::config::Config;
use crate::error::AutomationError;
use crate::session::{Session, SessionStatus};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

type SessionSlot = Arc<Mutex<Option<Session>>>;

pub struct SessionManager {
    config: Arc<Config>,
    behavior: HumanBehavior,
    slots: DashMap<String, SessionSlot>,
}

/// Exclusive access to one credential set's session for the duration of a
/// flow. Dropping the lease releases the per-credential-set lock.
pub struct SessionLease {
    guard: OwnedMutexGuard<Option<Session>>,
    /// Whether an existing login was reused instead of running a fresh one
    pub reused: bool,
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("reused", &self.reused)
            .finish_non_exhaustive()
    }
}

impl SessionLease {
    pub fn session(&self) -> Result<&Session, AutomationError> {
        self.guard.as_ref().ok_or(AutomationError::SessionClosed)
    }
}

impl SessionManager {
    pub fn new(config: Arc<Config>) -> Self {
        let behavior = HumanBehavior::new(&config.behavior);
        Self {
            config,
            behavior,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, credential_id: &str) -> SessionSlot {
        self.slots
            .entry(credential_id.to_string())
            .or_default()
            .clone()
    }

    /// Lease the credential set's session, creating it lazily and bringing it
    /// into the authenticated state.
    ///
    /// Serialization point: the lease holds the slot mutex, so a concurrent
    /// call for the same credential set waits here instead of creating a
    /// competing session or touching a half-initialized page.
    pub async fn acquire(&self, credential_id: &str) -> Result<SessionLease, AutomationError> {
        let credentials = self
            .config
            .credential(credential_id)
            .cloned()
            .ok_or_else(|| AutomationError::UnknownCredentialSet(credential_id.to_string()))?;

        if !credentials.is_complete() {
            return Err(AutomationError::InvalidConfiguration(format!(
                "credential set '{credential_id}' has no username/password configured"
            )));
        }

        let slot = self.slot(credential_id);
        let mut guard = slot.lock_owned().await;

        if guard.is_none() {
            *guard = Some(Session::open(credential_id, &self.config).await?);
        }

        let session = guard.as_mut().ok_or(AutomationError::SessionClosed)?;
        match session
            .ensure_authenticated(&credentials, &self.config, &self.behavior)
            .await
        {
            Ok(reused) => Ok(SessionLease { guard, reused }),
            Err(e) => {
                // A rejected login discards the session; anything else leaves
                // it open so the next call can attempt recovery.
                if e.discards_session() {
                    warn!(
                        credential = credential_id,
                        error = %e,
                        "discarding session after failed login"
                    );
                    if let Some(session) = guard.take() {
                        session.close().await;
                    }
                }
                Err(e)
            }
        }
    }

    /// Status of one credential set's session, inactive when none exists.
    pub async fn status(&self, credential_id: &str) -> SessionStatus {
        let slot = match self.slots.get(credential_id) {
            Some(entry) => entry.value().clone(),
            None => return SessionStatus::inactive(),
        };

        let guard = slot.lock().await;
        match guard.as_ref() {
            Some(session) => session.status().await,
            None => SessionStatus::inactive(),
        }
    }

    /// Status of every configured credential set.
    pub async fn status_all(&self) -> Vec<(String, SessionStatus)> {
        let mut statuses = Vec::with_capacity(self.config.credentials.len());
        for credential in &self.config.credentials {
            let status = self.status(&credential.id).await;
            statuses.push((credential.id.clone(), status));
        }
        statuses
    }

    /// Force-close one credential set's session. Returns whether one existed.
    pub async fn close(&self, credential_id: &str) -> bool {
        let slot = match self.slots.get(credential_id) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };

        let mut guard = slot.lock().await;
        match guard.take() {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    /// Close every live session. Called on shutdown so no external browser
    /// process outlives the service.
    pub async fn close_all(&self) {
        let slots: Vec<(String, SessionSlot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (credential_id, slot) in slots {
            let mut guard = slot.lock().await;
            if let Some(session) = guard.take() {
                info!(credential = %credential_id, "closing session on shutdown");
                session.close().await;
            }
        }
    }
}
