//! herald-send — deliver one message to every notification channel configured
//! in the environment (email, SMS, Slack, Discord, Telegram).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use herald_core::{load_dotenv, load_dotenv_from, NotificationConfig};
use herald_notify::Dispatcher;

// ── CLI ─────────────────────────────────────────────────────────────

/// Send a notification to every configured channel.
#[derive(Parser, Debug)]
#[command(name = "herald-send", version, about)]
struct Cli {
    /// Message to send. `{{NAME}}` placeholders are filled from the environment.
    #[arg(required_unless_present_any = ["message_file", "show_config"])]
    message: Option<String>,

    /// Read the message from a file instead of the command line.
    #[arg(long, conflicts_with = "message")]
    message_file: Option<PathBuf>,

    /// Env file to load instead of `.env`.
    #[arg(long, env = "HERALD_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Print the resolved channels (without credentials) and exit.
    #[arg(long)]
    show_config: bool,

    /// Exit non-zero when any channel fails to deliver.
    #[arg(long)]
    strict: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => load_dotenv_from(path)?,
        None => load_dotenv(),
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = NotificationConfig::from_env();

    if cli.show_config {
        println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
        return Ok(());
    }

    let message = match (&cli.message, &cli.message_file) {
        (Some(message), _) => message.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read message from {}", path.display()))?,
        (None, None) => anyhow::bail!("no message given"),
    };

    config.log_summary();
    if config.is_empty() {
        warn!("nothing to send, set NOTIFICATION_* variables to enable a channel");
        if cli.strict {
            anyhow::bail!("no notification channels configured");
        }
        return Ok(());
    }

    let results = Dispatcher::new(&config).dispatch(&message).await;

    for result in &results {
        match (&result.provider, &result.error) {
            (Some(provider), _) => println!(
                "{:<9} ok     via {} ({} ms)",
                result.channel, provider, result.duration_ms
            ),
            (None, error) => println!(
                "{:<9} FAILED {} ({} ms)",
                result.channel,
                error.as_deref().unwrap_or("unknown error"),
                result.duration_ms
            ),
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    info!(attempted = results.len(), failed, "notification finished");

    if cli.strict && failed > 0 {
        anyhow::bail!("{failed} of {} channels failed", results.len());
    }

    Ok(())
}
