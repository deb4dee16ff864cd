use crate::{Config, FilterCriteria, FlowOutcome, RelayService};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::warn;

#[derive(Parser)]
#[command(name = "report-relay")]
#[command(about = "Authenticated report extraction and downstream relay")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Download directory override")]
    pub download_dir: Option<PathBuf>,

    #[arg(long, help = "Run the browser with a visible window")]
    pub headed: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the report for a credential set and send it downstream
    Run {
        #[arg(short, long, default_value = "primary", help = "Credential set id")]
        credential: String,

        #[arg(long, help = "Date filter applied before export (YYYY-MM-DD)")]
        date: Option<String>,

        #[arg(long, help = "Downstream endpoint override")]
        endpoint: Option<String>,

        #[arg(long, help = "Retain the local artifact regardless of outcome")]
        retain: bool,

        #[arg(long, default_value = "1", help = "Whole-flow attempts before giving up")]
        attempts: usize,
    },

    /// Show session status per credential set
    Status {
        #[arg(short, long, help = "Credential set id (all when omitted)")]
        credential: Option<String>,

        #[arg(long, help = "Emit JSON")]
        json: bool,
    },

    /// Force-close browser sessions
    Close {
        #[arg(short, long, help = "Credential set id (all when omitted)")]
        credential: Option<String>,
    },

    /// Validate a configuration file
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

pub struct CliRunner {
    pub config: Config,
    pub service: Arc<RelayService>,
}

impl CliRunner {
    pub async fn new(mut config: Config, args: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        // Override config with CLI args
        if let Some(chrome_path) = &args.chrome_path {
            config.browser.chrome_path = Some(chrome_path.clone());
        }
        if let Some(download_dir) = &args.download_dir {
            config.download.directory = download_dir.clone();
        }
        if args.headed {
            config.browser.headless = false;
        }

        // Run-scoped overrides must land before the service is built
        if let Commands::Run {
            endpoint, retain, ..
        } = &args.command
        {
            if let Some(endpoint) = endpoint {
                config.dispatch.endpoint = endpoint.clone();
            }
            if *retain {
                config.dispatch.retain_artifacts = true;
            }
        }

        let service = Arc::new(RelayService::new(config.clone()).await?);

        Ok(Self { config, service })
    }

    pub async fn run(&self, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
        match command {
            Commands::Run {
                credential,
                date,
                attempts,
                ..
            } => self.run_flow(credential, date, attempts.max(1)).await,
            Commands::Status { credential, json } => self.show_status(credential, json).await,
            Commands::Close { credential } => self.close_sessions(credential).await,
            Commands::Validate { config } => self.validate_config(config).await,
        }
    }

    async fn run_flow(
        &self,
        credential: String,
        date: Option<String>,
        attempts: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let criteria = match date {
            Some(date) => Some(FilterCriteria::parse(&date)?),
            None => None,
        };

        // The core never retries; re-running the whole flow is this caller's
        // choice, bounded by --attempts.
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.service.download_and_send(&credential, criteria).await {
                Ok(outcome) => {
                    print_outcome(&credential, &outcome);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "flow attempt failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(Box::new(e)),
            None => Ok(()),
        }
    }

    async fn show_status(
        &self,
        credential: Option<String>,
        json: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let statuses = match credential {
            Some(id) => vec![(id.clone(), self.service.session_status(&id).await)],
            None => self.service.session_status_all().await,
        };

        if json {
            let mut map = serde_json::Map::new();
            for (id, status) in statuses {
                map.insert(id, serde_json::to_value(status)?);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(map))?
            );
            return Ok(());
        }

        println!("Session Status");
        println!("==============");
        println!("Downstream endpoint: {}", self.service.endpoint().await);
        for (id, status) in statuses {
            println!("\nCredential set '{id}':");
            println!("  Browser active: {}", status.browser_active);
            println!("  Page active: {}", status.page_active);
            println!("  Logged in: {}", status.is_logged_in);
            match &status.current_page_url {
                Some(url) => println!("  Current page: {url}"),
                None => println!("  Current page: -"),
            }
        }

        Ok(())
    }

    async fn close_sessions(
        &self,
        credential: Option<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match credential {
            Some(id) => {
                if self.service.close_session(&id).await {
                    println!("Session for '{id}' closed");
                } else {
                    println!("No session for '{id}'");
                }
            }
            None => {
                self.service.shutdown().await;
                println!("All sessions closed");
            }
        }

        Ok(())
    }

    async fn validate_config(
        &self,
        config_path: PathBuf,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path).await?;
        let config: Config = serde_json::from_str(&config_content)?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Login URL: {}", config.target.login_url);
        println!("  Download directory: {}", config.download.directory.display());
        println!("  Downstream endpoint: {}", config.dispatch.endpoint);
        println!("  Retain artifacts: {}", config.dispatch.retain_artifacts);
        println!(
            "  Credential sets: {}",
            config
                .credentials
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(())
    }
}

fn print_outcome(credential: &str, outcome: &FlowOutcome) {
    println!("Flow completed successfully:");
    println!("  Credential set: {credential}");
    println!("  Artifact: {}", outcome.excel_path.display());
    println!("  Reused session: {}", outcome.reused_session);
    if let Some(applied) = outcome.filter_applied {
        println!("  Filter applied: {applied}");
    }
    println!(
        "  Downstream: success={} message={}",
        outcome.downstream.success, outcome.downstream.message
    );
    println!("  Timestamp: {}", outcome.timestamp.to_rfc3339());
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
