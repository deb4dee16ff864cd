//! Orchestrator composing session, filter, retrieval, and dispatch
//!
//! `RelayService` is the single entry point for the download-and-send use
//! case and its admin variants (status, close, endpoint reconfiguration).
//! Nothing here retries: a failed flow returns its typed error and the caller
//! decides whether to run the whole flow again.
//!
//! # Examples
//!
//! ```rust,no_run
//! use report_relay::{Config, RelayService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RelayService::new(Config::default()).await?;
//!
//!     let outcome = service.download_and_send("primary", None).await?;
//!     println!("dispatched: {}", outcome.downstream.message);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::config::Config;
use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::error::AutomationError;
use crate::filter::{FilterCriteria, FilterStage};
use crate::metrics::Metrics;
use crate::retriever::ArtifactRetriever;
use crate::session::SessionStatus;
use crate::session_manager::SessionManager;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Composite result of one download-and-send flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowOutcome {
    pub flow_id: String,
    /// Where the artifact was written. Under the default configuration the
    /// file is already deleted by the time the caller sees this.
    pub excel_path: PathBuf,
    pub downstream: DispatchResult,
    pub timestamp: DateTime<Utc>,
    pub reused_session: bool,
    /// `None` when no criteria were given, otherwise whether the filter
    /// actually took effect
    pub filter_applied: Option<bool>,
}

pub struct RelayService {
    sessions: Arc<SessionManager>,
    retriever: ArtifactRetriever,
    dispatcher: Arc<Dispatcher>,
    filter: FilterStage,
    metrics: Arc<Metrics>,
    config: Arc<Config>,
}

impl RelayService {
    pub async fn new(config: Config) -> Result<Self, AutomationError> {
        config.validate()?;
        let config = Arc::new(config);

        tokio::fs::create_dir_all(&config.download.directory).await?;
        info!(
            directory = %config.download.directory.display(),
            "download directory ready"
        );

        Ok(Self {
            sessions: Arc::new(SessionManager::new(config.clone())),
            retriever: ArtifactRetriever::new(config.clone()),
            dispatcher: Arc::new(Dispatcher::new(config.clone())),
            filter: FilterStage::new(config.clone()),
            metrics: Arc::new(Metrics::new()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full use case for one credential set: authenticate (reusing
    /// the session when the marker allows it), optionally filter, export,
    /// dispatch, clean up.
    pub async fn download_and_send(
        &self,
        credential_id: &str,
        criteria: Option<FilterCriteria>,
    ) -> Result<FlowOutcome, AutomationError> {
        let flow_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(
            flow = %flow_id,
            credential = credential_id,
            "starting download-and-send flow"
        );

        let result = self.run_flow(&flow_id, credential_id, criteria.as_ref()).await;

        match &result {
            Ok(outcome) => {
                self.metrics.record_flow(started.elapsed());
                info!(
                    flow = %flow_id,
                    file = %outcome.excel_path.display(),
                    reused_session = outcome.reused_session,
                    "flow complete"
                );
            }
            Err(e) => {
                self.metrics.record_failure(e.kind());
                warn!(flow = %flow_id, error = %e, "flow failed");
            }
        }

        result
    }

    async fn run_flow(
        &self,
        flow_id: &str,
        credential_id: &str,
        criteria: Option<&FilterCriteria>,
    ) -> Result<FlowOutcome, AutomationError> {
        // Lease held until this function returns: the whole flow is
        // serialized against other calls for the same credential set.
        let lease = self.sessions.acquire(credential_id).await?;
        self.metrics.record_checkout(lease.reused);
        let session = lease.session()?;

        let filter_applied = match criteria {
            Some(c) => Some(self.filter.apply(session.page()?, c).await?),
            None => None,
        };

        let artifact = self.retriever.retrieve(session).await?;
        self.metrics.record_download();

        let downstream = self.dispatcher.send(&artifact).await?;
        self.metrics.record_dispatch(downstream.success);

        Ok(FlowOutcome {
            flow_id: flow_id.to_string(),
            excel_path: artifact.local_path,
            downstream,
            timestamp: Utc::now(),
            reused_session: lease.reused,
            filter_applied,
        })
    }

    pub async fn session_status(&self, credential_id: &str) -> SessionStatus {
        self.sessions.status(credential_id).await
    }

    pub async fn session_status_all(&self) -> Vec<(String, SessionStatus)> {
        self.sessions.status_all().await
    }

    /// Force-close one credential set's session; returns whether one existed.
    pub async fn close_session(&self, credential_id: &str) -> bool {
        self.sessions.close(credential_id).await
    }

    pub async fn endpoint(&self) -> String {
        self.dispatcher.endpoint().await
    }

    /// Repoint the downstream endpoint without a restart.
    pub async fn set_endpoint(&self, endpoint: &str) -> Result<(), AutomationError> {
        self.dispatcher.set_endpoint(endpoint).await
    }

    /// Release every browser session. Called on shutdown signals.
    pub async fn shutdown(&self) {
        info!("shutting down relay service...");
        self.sessions.close_all().await;
        info!("relay service shutdown complete");
    }
}
