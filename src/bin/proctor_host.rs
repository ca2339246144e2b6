//! Headless proctored-session binary for stdin/stdout JSON communication.
//!
//! Usage: `proctor-host <session-id> [--config <path>]`
//!
//! Reads host commands as newline-delimited JSON from stdin and writes UI
//! events and shell requests to stdout. All tracing/diagnostic output goes to
//! stderr so that stdout remains a clean JSON protocol channel.

use std::path::PathBuf;

use anyhow::Context;
use proctor::config::ProctorConfig;
use proctor::host::run_stdio_bridge;

struct Args {
    session_id: String,
    config_path: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut session_id = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
            }
            other if other.starts_with("--") => anyhow::bail!("unknown option: {other}"),
            other => {
                if session_id.replace(other.to_owned()).is_some() {
                    anyhow::bail!("only one session id may be given");
                }
            }
        }
    }
    Ok(Args {
        session_id: session_id.context("usage: proctor-host <session-id> [--config <path>]")?,
        config_path,
    })
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<ProctorConfig> {
    if let Some(path) = explicit {
        return ProctorConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    let path = ProctorConfig::default_config_path();
    if path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        return ProctorConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    Ok(ProctorConfig::default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing to stderr only (stdout is reserved for the JSON
    // protocol).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = load_config(args.config_path)?;
    tracing::info!(session_id = %args.session_id, "proctor-host starting");

    let outcome = run_stdio_bridge(config, args.session_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "proctor-host exited with error");
            anyhow::anyhow!("proctor-host failed: {e}")
        })?;

    tracing::info!(
        status = %outcome.status,
        navigated = outcome.navigated,
        "proctor-host shut down cleanly"
    );
    Ok(())
}
