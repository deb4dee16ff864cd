//! # report-relay
//!
//! Drives an authenticated browser session against a single external web
//! application, exports its report artifact, and relays the file to a
//! downstream ingestion endpoint. The session layer keeps one persistent
//! Chromium session per credential set, detects whether an existing login is
//! still valid, and only re-runs the login sequence when it is not.
//!
//! The artifact is treated as an opaque byte blob: it is saved under a
//! timestamp-unique name, POSTed downstream as multipart form data, and
//! deleted once the downstream accepts it (unless the diagnostic retain
//! configuration is active).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use report_relay::{Config, FilterCriteria, RelayService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RelayService::new(Config::default()).await?;
//!
//!     let criteria = FilterCriteria::parse("2024-01-15")?;
//!     let outcome = service.download_and_send("primary", Some(criteria)).await?;
//!     println!(
//!         "dispatched {} (reused session: {})",
//!         outcome.excel_path.display(),
//!         outcome.reused_session
//!     );
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ### Download and send
//! ```bash
//! report-relay run --credential primary --date 2024-01-15
//! ```
//!
//! ### Session status
//! ```bash
//! report-relay status --json
//! ```
//!
//! ### Force-close sessions
//! ```bash
//! report-relay close
//! ```

/// Configuration: target affordances, browser settings, timeouts
pub mod config;

/// Error types shared across the pipeline
pub mod error;

/// Browser process launch and low-level page helpers
pub mod browser;

/// Human-behavior simulation used during login
pub mod behavior;

/// Credential sets identifying the target-application actors
pub mod credentials;

/// Login state machine for one persistent session
pub mod session;

/// Session ownership keyed by credential set
pub mod session_manager;

/// Optional pre-export date filter
pub mod filter;

/// Export trigger and download capture
pub mod retriever;

/// Multipart dispatch to the downstream endpoint
pub mod dispatcher;

/// Orchestrator for the download-and-send use case
pub mod relay_service;

/// Flow counters
pub mod metrics;

/// Command-line interface implementation
pub mod cli;

#[cfg(test)]
mod tests;

pub use behavior::*;
pub use browser::*;
pub use cli::*;
pub use config::*;
pub use credentials::*;
pub use dispatcher::*;
pub use error::*;
pub use filter::*;
pub use metrics::*;
pub use relay_service::*;
pub use retriever::*;
pub use session::*;
pub use session_manager::*;
