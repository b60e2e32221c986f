//! Router Daemon - Streaming Generation over HTTP
//!
//! Entry point for the model router. It serves `POST /generate`, picking a
//! backend model per request from the selection policy published through
//! the AppConfig sidecar, and offers an offline `build-policy` command that
//! turns evaluation results into a policy document.
//!
//! # Usage
//!
//! ```bash
//! # Serve with settings from the environment
//! APP_CONFIG_APPLICATION_NAME=AIAssistantApp \
//! APP_CONFIG_ENVIRONMENT=Production \
//! APP_CONFIG_CONFIGURATION=ModelSelectionStrategy \
//! router-daemon
//!
//! # Custom bind address and config file
//! router-daemon --bind 0.0.0.0:9000 --config /etc/model-router/router.toml
//!
//! # Build a policy from evaluation results
//! router-daemon build-policy --input results.json --output strategy.json
//!
//! # Verbose logging
//! RUST_LOG=debug router-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

mod server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use router_core::config::{default_config_path, load_settings_from_path, SettingsOverrides};
use router_core::routing::{build_policy, EvaluationRecord};

/// Router Daemon - use-case model routing with streamed responses
#[derive(Parser, Debug)]
#[command(name = "router-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "ROUTER_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP listener to
    #[arg(short = 'b', long, value_name = "ADDR", global = true)]
    bind: Option<String>,

    /// Port of the AppConfig sidecar
    #[arg(long, value_name = "PORT", global = true)]
    sidecar_port: Option<u16>,

    /// Override the backend endpoint base URL
    #[arg(long, value_name = "URL", global = true)]
    backend_endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "ROUTER_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve generation requests (default)
    Serve,

    /// Build a selection policy from evaluation results
    BuildPolicy {
        /// JSON array of evaluation records
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Where to write the policy (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        let mut overrides = SettingsOverrides::new();
        if let Some(ref bind) = self.bind {
            overrides = overrides.with_bind_address(bind);
        }
        if let Some(port) = self.sidecar_port {
            overrides = overrides.with_sidecar_port(port);
        }
        if let Some(ref endpoint) = self.backend_endpoint {
            overrides = overrides.with_backend_endpoint(endpoint);
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("router_daemon={level},router_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_server(args: &Args) -> Result<()> {
    let config_path = args.config.clone().or_else(default_config_path);
    let mut settings =
        load_settings_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut settings);
    settings.validate().context("Invalid configuration")?;

    info!(
        source = %settings.source(),
        config_file = ?settings.config_file_path,
        "Configuration loaded"
    );

    server::serve(settings).await
}

async fn run_build_policy(input: &Path, output: Option<&Path>) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read evaluation results: {}", input.display()))?;
    let records: Vec<EvaluationRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid evaluation results: {}", input.display()))?;

    let policy = build_policy(&records)?;
    let json = serde_json::to_string_pretty(&policy)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, format!("{json}\n"))
                .await
                .with_context(|| format!("Failed to write policy: {}", path.display()))?;
            info!(
                path = %path.display(),
                primary = %policy.primary_model,
                models = policy.model_scores.len(),
                "Policy written"
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    match args.command {
        Some(Command::BuildPolicy {
            ref input,
            ref output,
        }) => run_build_policy(input, output.as_deref()).await,
        Some(Command::Serve) | None => {
            info!("Router Daemon starting");
            info!("Version: {}", env!("CARGO_PKG_VERSION"));
            run_server(&args).await
        }
    }
}
