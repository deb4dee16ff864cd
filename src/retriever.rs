//! Artifact retrieval: trigger the export and capture the downloaded file
//!
//! Waits for the export control, points Chromium's download machinery at the
//! configured directory, clicks, and watches the directory until the file
//! lands. The persisted artifact gets a timestamped name claimed atomically,
//! so concurrent flows sharing the directory cannot collide even inside the
//! same clock-millisecond.

use crate::browser;
use crate::config::Config;
use crate::error::AutomationError;
use crate::session::Session;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The exported report file, persisted locally and ready for dispatch
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub local_path: PathBuf,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

pub struct ArtifactRetriever {
    config: Arc<Config>,
}

impl ArtifactRetriever {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Trigger the export on an authenticated session and persist the
    /// resulting download.
    ///
    /// Any failure produces a best-effort diagnostic screenshot next to the
    /// artifacts; a failed screenshot is logged and never replaces the
    /// original error.
    pub async fn retrieve(&self, session: &Session) -> Result<DownloadArtifact, AutomationError> {
        let page = session.page()?;

        match self.retrieve_inner(page).await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                self.capture_failure_screenshot(page).await;
                Err(e)
            }
        }
    }

    async fn retrieve_inner(&self, page: &Page) -> Result<DownloadArtifact, AutomationError> {
        let dir = self.config.download.directory.clone();
        tokio::fs::create_dir_all(&dir).await?;

        let export = browser::wait_for_element(
            page,
            &self.config.target.export_selector,
            self.config.timeouts.element_wait,
        )
        .await?;

        self.allow_downloads(page, &dir).await?;

        let before = snapshot_dir(&dir).await?;
        export
            .click()
            .await
            .map_err(|e| AutomationError::Page(e.to_string()))?;

        let downloaded = self
            .await_download(&dir, &before, self.config.timeouts.download)
            .await?;

        let created_at = Utc::now();
        let (local_path, filename) = claim_artifact_path(
            &dir,
            &self.config.download.file_prefix,
            created_at.timestamp_millis(),
        )
        .await?;
        tokio::fs::rename(&downloaded, &local_path).await?;

        info!(file = %local_path.display(), "artifact captured");
        Ok(DownloadArtifact {
            local_path,
            filename,
            created_at,
        })
    }

    /// Point Chromium's download handling at the artifact directory.
    async fn allow_downloads(&self, page: &Page, dir: &Path) -> Result<(), AutomationError> {
        // Chromium resolves relative download paths against its own cwd
        let absolute = tokio::fs::canonicalize(dir).await?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(absolute.to_string_lossy())
            .build()
            .map_err(AutomationError::Page)?;
        page.execute(params).await?;

        Ok(())
    }

    /// Watch the directory for the exported file until it is complete or the
    /// timeout expires.
    async fn await_download(
        &self,
        dir: &Path,
        before: &HashSet<OsString>,
        timeout: Duration,
    ) -> Result<PathBuf, AutomationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_seen: Option<(PathBuf, u64)> = None;

        loop {
            if let Some(path) = self.find_new_download(dir, before).await? {
                let size = tokio::fs::metadata(&path).await?.len();
                match &last_seen {
                    // complete once the size holds still across two polls
                    Some((prev_path, prev_size))
                        if *prev_path == path && *prev_size == size && size > 0 =>
                    {
                        return Ok(path);
                    }
                    _ => last_seen = Some((path, size)),
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::DownloadTimeout(timeout));
            }

            sleep(DOWNLOAD_POLL_INTERVAL).await;
        }
    }

    async fn find_new_download(
        &self,
        dir: &Path,
        before: &HashSet<OsString>,
    ) -> Result<Option<PathBuf>, AutomationError> {
        let claimed_prefix = format!("{}_", self.config.download.file_prefix);
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if before.contains(&name) {
                continue;
            }

            let name = name.to_string_lossy();
            // in-progress Chromium downloads
            if name.ends_with(".crdownload") || name.ends_with(".tmp") {
                continue;
            }
            // artifacts already claimed by this or a concurrent flow
            if name.starts_with(&claimed_prefix) {
                continue;
            }
            // our own diagnostic screenshots
            if name.starts_with("error_") {
                continue;
            }

            return Ok(Some(entry.path()));
        }

        Ok(None)
    }

    async fn capture_failure_screenshot(&self, page: &Page) {
        let path = self.config.download.directory.join(format!(
            "error_{}.png",
            Utc::now().timestamp_millis()
        ));

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        match page.screenshot(params).await {
            Ok(data) => match tokio::fs::write(&path, &data).await {
                Ok(()) => warn!(screenshot = %path.display(), "saved failure screenshot"),
                Err(e) => warn!(error = %e, "failed to write failure screenshot"),
            },
            Err(e) => warn!(error = %e, "failed to capture failure screenshot"),
        }
    }
}

/// Atomically claim a unique `<prefix>_<epoch-ms>.xlsx` path.
///
/// `create_new` is the claim: if another flow took the same millisecond the
/// open fails and the timestamp is bumped until a free slot is found.
pub(crate) async fn claim_artifact_path(
    dir: &Path,
    prefix: &str,
    timestamp_ms: i64,
) -> Result<(PathBuf, String), AutomationError> {
    let mut ts = timestamp_ms;

    loop {
        let filename = format!("{prefix}_{ts}.xlsx");
        let path = dir.join(&filename);

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok((path, filename)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => ts += 1,
            Err(e) => return Err(AutomationError::Filesystem(e.to_string())),
        }
    }
}

async fn snapshot_dir(dir: &Path) -> Result<HashSet<OsString>, AutomationError> {
    let mut names = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        names.insert(entry.file_name());
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_artifact_path_unique_within_one_millisecond() {
        let dir = tempfile::tempdir().unwrap();

        let (first, first_name) = claim_artifact_path(dir.path(), "Reporte", 1_700_000_000_000)
            .await
            .unwrap();
        let (second, second_name) = claim_artifact_path(dir.path(), "Reporte", 1_700_000_000_000)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(first_name, "Reporte_1700000000000.xlsx");
        assert_eq!(second_name, "Reporte_1700000000001.xlsx");
    }

    #[tokio::test]
    async fn test_claim_artifact_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Reporte_42.xlsx"), b"taken").unwrap();
        std::fs::write(dir.path().join("Reporte_43.xlsx"), b"taken").unwrap();

        let (_, filename) = claim_artifact_path(dir.path(), "Reporte", 42).await.unwrap();
        assert_eq!(filename, "Reporte_44.xlsx");
    }

    #[tokio::test]
    async fn test_claims_are_distinct_under_contention() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = HashSet::new();

        for _ in 0..50 {
            let (_, filename) = claim_artifact_path(dir.path(), "Reporte", 7).await.unwrap();
            assert!(names.insert(filename));
        }
    }
}
