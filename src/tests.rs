#[cfg(test)]
mod integration_tests {
    use crate::{
        AutomationError, Config, CredentialSet, Dispatcher, DownloadArtifact, ExpiredPolicy,
        HumanBehavior, SessionManager, SessionStatus, ORIGIN_MARKER,
    };
    use chrono::Utc;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.target.username_selector, "#authname");
        assert_eq!(config.target.password_selector, "#authpass");
        assert_eq!(config.target.submit_selector, "#authbtn");
        assert_eq!(config.download.file_prefix, "Reporte");
        assert_eq!(config.timeouts.element_wait, Duration::from_secs(30));
        assert_eq!(config.timeouts.download, Duration::from_secs(60));
        assert!(!config.dispatch.retain_artifacts);
        assert_eq!(config.expired_policy, ExpiredPolicy::Relogin);
        assert_eq!(config.credentials.len(), 2);
        assert!(config.credential("primary").is_some());
        assert!(config.credential("alternate").is_some());
        assert!(config.credential("other").is_none());

        config.validate().expect("default config must validate");
    }

    #[test]
    fn test_config_validation_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.dispatch.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_duplicate_credentials() {
        let mut config = Config::default();
        config.credentials.push(CredentialSet::new("primary", "x", "y"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_inverted_delays() {
        let mut config = Config::default();
        config.behavior.min_delay_ms = 500;
        config.behavior.max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chrome_args_generation() {
        let config = Config::default();
        let args = crate::get_chrome_args(&config.browser);

        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-dev-shm-usage".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&format!(
            "--window-size={},{}",
            config.browser.width, config.browser.height
        )));
    }

    #[test]
    fn test_credential_set_completeness() {
        assert!(CredentialSet::new("primary", "user", "pass").is_complete());
        assert!(!CredentialSet::new("primary", "user", "").is_complete());
        assert!(!CredentialSet::new("primary", "", "pass").is_complete());
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let credentials = CredentialSet::new("primary", "user", "hunter2");
        let printed = format!("{credentials:?}");

        assert!(printed.contains("user"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AutomationError::Authentication("primary".to_string()).kind(),
            "authentication"
        );
        assert_eq!(AutomationError::SessionExpired.kind(), "session_expired");
        assert_eq!(
            AutomationError::DownloadTimeout(Duration::from_secs(60)).kind(),
            "download_timeout"
        );
        assert_eq!(
            AutomationError::Upload {
                status: Some(500),
                message: "boom".to_string()
            }
            .kind(),
            "upload"
        );
    }

    #[test]
    fn test_only_login_failures_discard_the_session() {
        assert!(AutomationError::Authentication("primary".to_string()).discards_session());
        assert!(!AutomationError::SessionExpired.discards_session());
        assert!(!AutomationError::DownloadTimeout(Duration::from_secs(1)).discards_session());
        assert!(!AutomationError::Upload {
            status: None,
            message: "unreachable".to_string()
        }
        .discards_session());
        assert!(!AutomationError::Filesystem("disk full".to_string()).discards_session());
    }

    #[test]
    fn test_session_status_inactive() {
        let status = SessionStatus::inactive();
        assert!(!status.browser_active);
        assert!(!status.page_active);
        assert!(!status.is_logged_in);
        assert!(status.current_page_url.is_none());
    }

    #[tokio::test]
    async fn test_behavior_pause_respects_maximum() {
        let behavior = HumanBehavior::new(&crate::BehaviorConfig {
            min_delay_ms: 5,
            max_delay_ms: 25,
            scroll_jitter: false,
        });

        let start = std::time::Instant::now();
        behavior.pause().await;
        // generous upper bound; the point is that it cannot sleep for seconds
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(behavior.max_delay(), Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_manager_rejects_unknown_credential_set() {
        let manager = SessionManager::new(Arc::new(Config::default()));

        let err = manager.acquire("nobody").await.unwrap_err();
        assert!(matches!(err, AutomationError::UnknownCredentialSet(_)));
    }

    #[tokio::test]
    async fn test_manager_rejects_incomplete_credentials() {
        // default credential sets carry empty username/password
        let manager = SessionManager::new(Arc::new(Config::default()));

        let err = manager.acquire("primary").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_status_is_inactive_before_first_use() {
        let manager = SessionManager::new(Arc::new(Config::default()));

        let statuses = manager.status_all().await;
        assert_eq!(statuses.len(), 2);
        for (_, status) in statuses {
            assert!(!status.browser_active);
            assert!(!status.is_logged_in);
        }
    }

    fn test_config(dir: &Path, endpoint: &str, retain: bool) -> Config {
        let mut config = Config::default();
        config.download.directory = dir.to_path_buf();
        config.dispatch.endpoint = endpoint.to_string();
        config.dispatch.retain_artifacts = retain;
        config.timeouts.upload = Duration::from_secs(5);
        config
    }

    fn make_artifact(dir: &Path) -> DownloadArtifact {
        let filename = "Reporte_1700000000000.xlsx".to_string();
        let local_path = dir.join(&filename);
        std::fs::write(&local_path, b"opaque spreadsheet bytes").unwrap();

        DownloadArtifact {
            local_path,
            filename,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_success_deletes_artifact_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "success": true, "message": "ok", "registros": 45 }),
            ))
            .mount(&server)
            .await;

        let endpoint = format!("{}/ingest", server.uri());
        let config = Arc::new(test_config(dir.path(), &endpoint, false));
        let dispatcher = Dispatcher::new(config);
        let artifact = make_artifact(dir.path());

        let result = dispatcher.send(&artifact).await.unwrap();

        assert!(result.success);
        assert_eq!(result.message, "ok");
        assert_eq!(result.raw["registros"], 45);
        assert!(
            !artifact.local_path.exists(),
            "accepted artifact must be deleted under the default configuration"
        );
    }

    #[tokio::test]
    async fn test_dispatch_success_retains_artifact_in_diagnostic_mode() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "success": true, "message": "ok" })),
            )
            .mount(&server)
            .await;

        let endpoint = format!("{}/ingest", server.uri());
        let config = Arc::new(test_config(dir.path(), &endpoint, true));
        let dispatcher = Dispatcher::new(config);
        let artifact = make_artifact(dir.path());

        let result = dispatcher.send(&artifact).await.unwrap();

        assert!(result.success);
        assert!(artifact.local_path.exists());
    }

    #[tokio::test]
    async fn test_dispatch_sends_multipart_with_origin_marker() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "success": true, "message": "ok" })),
            )
            .mount(&server)
            .await;

        let endpoint = format!("{}/ingest", server.uri());
        let config = Arc::new(test_config(dir.path(), &endpoint, true));
        let dispatcher = Dispatcher::new(config);
        let artifact = make_artifact(dir.path());

        dispatcher.send(&artifact).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);

        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains(&artifact.filename));
        assert!(body.contains("name=\"origen\""));
        assert!(body.contains(ORIGIN_MARKER));
    }

    #[tokio::test]
    async fn test_dispatch_rejection_keeps_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(500).set_body_string("ingestion exploded"))
            .mount(&server)
            .await;

        let endpoint = format!("{}/ingest", server.uri());
        let config = Arc::new(test_config(dir.path(), &endpoint, false));
        let dispatcher = Dispatcher::new(config);
        let artifact = make_artifact(dir.path());

        let err = dispatcher.send(&artifact).await.unwrap_err();

        match err {
            AutomationError::Upload { status, message } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("ingestion exploded"));
            }
            other => panic!("expected Upload error, got {other:?}"),
        }
        assert!(
            artifact.local_path.exists(),
            "artifact must survive a failed dispatch for manual recovery"
        );
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_endpoint_keeps_artifact() {
        let dir = tempfile::tempdir().unwrap();
        // nothing listens on the discard port
        let config = Arc::new(test_config(dir.path(), "http://127.0.0.1:9/ingest", false));
        let dispatcher = Dispatcher::new(config);
        let artifact = make_artifact(dir.path());

        let err = dispatcher.send(&artifact).await.unwrap_err();

        assert!(matches!(err, AutomationError::Upload { .. }));
        assert!(artifact.local_path.exists());
    }

    #[tokio::test]
    async fn test_dispatch_rejects_non_json_acceptance() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let endpoint = format!("{}/ingest", server.uri());
        let config = Arc::new(test_config(dir.path(), &endpoint, false));
        let dispatcher = Dispatcher::new(config);
        let artifact = make_artifact(dir.path());

        let err = dispatcher.send(&artifact).await.unwrap_err();

        assert!(matches!(err, AutomationError::Upload { status: Some(200), .. }));
        assert!(artifact.local_path.exists());
    }

    #[tokio::test]
    async fn test_endpoint_is_mutable_at_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/elsewhere"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "success": true, "message": "ok" })),
            )
            .mount(&server)
            .await;

        // dispatcher starts pointed at the preconfigured default
        let config = Arc::new(test_config(dir.path(), "http://localhost:1/ingest", true));
        let dispatcher = Dispatcher::new(config);

        let elsewhere = format!("{}/elsewhere", server.uri());
        dispatcher.set_endpoint(&elsewhere).await.unwrap();
        assert_eq!(dispatcher.endpoint().await, elsewhere);

        let artifact = make_artifact(dir.path());
        let result = dispatcher.send(&artifact).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_set_endpoint_rejects_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(test_config(dir.path(), "http://localhost:1/ingest", true));
        let dispatcher = Dispatcher::new(config);

        let err = dispatcher.set_endpoint("not a url").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidConfiguration(_)));
    }

    // Requires a local Chromium; warns instead of failing where none exists,
    // matching how the rest of this crate's browser tests behave in CI.
    #[tokio::test]
    async fn test_live_session_open_and_close() {
        let mut config = Config::default();
        config.browser.chrome_path = std::env::var("CHROME_PATH").ok();

        match crate::Session::open("primary", &config).await {
            Ok(session) => {
                let status = session.status().await;
                assert!(status.browser_active);
                assert!(!status.page_active);
                assert!(!status.is_logged_in);
                session.close().await;
            }
            Err(e) => {
                eprintln!("skipping live browser test (expected in some environments): {e:?}");
            }
        }
    }
}
