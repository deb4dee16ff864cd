//! Artifact dispatch to the downstream ingestion endpoint
//!
//! Uploads the exported file as a multipart POST and performs the
//! delete-on-success cleanup. The artifact is never parsed; its bytes travel
//! unmodified. The endpoint is runtime-mutable so the downstream can be
//! repointed without restarting the service.

use crate::config::Config;
use crate::error::AutomationError;
use crate::retriever::DownloadArtifact;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Multipart field carrying the artifact bytes
pub const UPLOAD_FIELD: &str = "file";
/// Multipart field carrying the static origin marker
pub const ORIGIN_FIELD: &str = "origen";
/// Value identifying this service to the downstream endpoint
pub const ORIGIN_MARKER: &str = "report-relay";

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const BODY_PREVIEW_LIMIT: usize = 300;

/// Outcome reported by the downstream endpoint
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub success: bool,
    pub message: String,
    /// Full response payload, for callers that need downstream-specific fields
    pub raw: serde_json::Value,
}

pub struct Dispatcher {
    client: reqwest::Client,
    endpoint: RwLock<String>,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        // No overall client timeout and no body-size cap; each upload is
        // bounded per request instead.
        let client = reqwest::Client::new();
        let endpoint = RwLock::new(config.dispatch.endpoint.clone());

        Self {
            client,
            endpoint,
            config,
        }
    }

    pub async fn endpoint(&self) -> String {
        self.endpoint.read().await.clone()
    }

    /// Repoint the downstream endpoint without a restart.
    pub async fn set_endpoint(&self, endpoint: &str) -> Result<(), AutomationError> {
        url::Url::parse(endpoint).map_err(|e| {
            AutomationError::InvalidConfiguration(format!("invalid endpoint URL: {e}"))
        })?;

        *self.endpoint.write().await = endpoint.to_string();
        info!(endpoint, "downstream endpoint updated");
        Ok(())
    }

    /// Upload the artifact and clean it up on acceptance.
    ///
    /// A 2xx JSON response becomes a `DispatchResult`. Anything else (non-2xx
    /// status, transport failure, non-JSON body) is an `Upload` error, and the
    /// artifact stays on disk for manual recovery.
    pub async fn send(&self, artifact: &DownloadArtifact) -> Result<DispatchResult, AutomationError> {
        let endpoint = self.endpoint().await;
        let bytes = tokio::fs::read(&artifact.local_path).await?;

        info!(
            file = %artifact.filename,
            bytes = bytes.len(),
            endpoint = %endpoint,
            "dispatching artifact"
        );

        let part = Part::bytes(bytes)
            .file_name(artifact.filename.clone())
            .mime_str(XLSX_MIME)
            .map_err(|e| AutomationError::InvalidConfiguration(e.to_string()))?;
        let form = Form::new()
            .part(UPLOAD_FIELD, part)
            .text(ORIGIN_FIELD, ORIGIN_MARKER);

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .timeout(self.config.timeouts.upload)
            .send()
            .await
            .map_err(|e| AutomationError::Upload {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AutomationError::Upload {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AutomationError::Upload {
                status: Some(status.as_u16()),
                message: preview(&body),
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|_| AutomationError::Upload {
                status: Some(status.as_u16()),
                message: format!("expected JSON response, got: {}", preview(&body)),
            })?;

        let result = DispatchResult {
            success: raw.get("success").and_then(|v| v.as_bool()).unwrap_or(false),
            message: raw
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            raw,
        };

        if result.success && !self.config.dispatch.retain_artifacts {
            // Deletion failure is logged, never escalated: the dispatch
            // itself succeeded.
            if let Err(e) = tokio::fs::remove_file(&artifact.local_path).await {
                warn!(
                    file = %artifact.local_path.display(),
                    error = %e,
                    "failed to delete dispatched artifact"
                );
            }
        }

        Ok(result)
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_PREVIEW_LIMIT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
        format!("{cut}…")
    }
}
