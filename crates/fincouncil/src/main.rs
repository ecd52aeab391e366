use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fincouncil_models::config::CouncilConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fincouncil", about = "Multi-advisor financial question answering")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/fincouncil.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the council a question
    Run {
        /// The user's question
        #[arg(short, long)]
        query: String,

        /// JSON file with the user's financial context
        #[arg(long)]
        context: Option<String>,

        /// Use this session id instead of a generated one
        #[arg(long)]
        session_id: Option<String>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Print a stored session
    Show {
        session_id: String,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
}

fn load_config(path: &str) -> Result<CouncilConfig> {
    if !Path::new(path).exists() {
        info!(path, "Config file not found, using defaults");
        return Ok(CouncilConfig::default());
    }
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {path}"))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON (respects RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if let Some(parent) = Path::new(&config.store.sqlite_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }
    }

    let coordinator =
        fincouncil::build_coordinator(&config).context("Failed to build coordinator")?;

    match cli.command {
        Command::Run {
            query,
            context,
            session_id,
            pretty,
        } => {
            let financial_context = match context {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read context: {path}"))?;
                    serde_json::from_str(&raw).context("Failed to parse context JSON")?
                }
                None => serde_json::json!({}),
            };

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, cancelling");
                    on_signal.cancel();
                }
            });

            let session = coordinator
                .run_collaboration_with_cancel(&query, financial_context, session_id, cancel)
                .await
                .context("Collaboration failed")?;
            print_json(&session, pretty)?;
        }
        Command::Show { session_id, pretty } => {
            let session = fincouncil::get_session(&coordinator, &session_id)
                .await
                .with_context(|| format!("Failed to load session {session_id}"))?;
            print_json(&session, pretty)?;
        }
    }

    Ok(())
}
