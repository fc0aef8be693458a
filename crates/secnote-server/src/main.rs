//! secnoted: encrypted note storage server
//!
//! Usage:
//!   secnoted [--config /etc/secnote/config.toml] [--listen 0.0.0.0:3000]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use secnote_core::config::SecnoteConfig;
use secnote_core::SecnoteError;
use secnote_server::{router, AppState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often expired notes are swept when no requests arrive
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "secnoted", version, about = "secnote encrypted note server")]
struct Cli {
    /// Path to secnote.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SECNOTE_CONFIG",
        default_value = "/etc/secnote/config.toml"
    )]
    config: PathBuf,

    /// Listen address, overrides [server].listen
    #[arg(long, env = "SECNOTE_LISTEN")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error), overrides [server].log_level
    #[arg(long, env = "SECNOTE_LOG")]
    log: Option<String>,

    /// Log format, overrides [server].log_format
    #[arg(long, env = "SECNOTE_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log settings live in the config, so it is read before the subscriber exists.
    let loaded = load_config(&cli.config)?;
    let config_found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();

    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let level = cli.log.unwrap_or_else(|| config.server.log_level.clone());
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.server.log_format, true)
            .map_err(|e| anyhow::anyhow!("invalid [server].log_format: {e}"))?,
    };
    init_logging(&level, &format);

    if !config_found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "secnoted starting"
    );

    run(config).await
}

/// `None` when the file does not exist; any other failure is an error.
fn load_config(path: &Path) -> Result<Option<SecnoteConfig>> {
    match SecnoteConfig::load(path) {
        Ok(config) => Ok(Some(config)),
        Err(SecnoteError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context(format!("loading config {}", path.display()))),
    }
}

async fn run(config: SecnoteConfig) -> Result<()> {
    let max_memory_usage = usize::try_from(config.server.max_memory_usage).unwrap_or(usize::MAX);
    let state = Arc::new(AppState::new(config.limits, max_memory_usage));

    tokio::spawn(sweep_expired(state.clone()));

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("bind {}", config.server.listen))?;

    info!(
        addr = %listener.local_addr()?,
        max_note_size = config.limits.max_note_size,
        max_memory_usage,
        "listening on /notes, /config, /metrics, /healthz"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("secnoted stopped");
    Ok(())
}

/// Collect expired notes periodically so an idle server releases memory.
async fn sweep_expired(state: Arc<AppState>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let mut store = state.store.lock().await;
        let collected = store.collect_expired(Instant::now());
        state
            .metrics
            .observe_store(store.memory_usage(), store.len());
        if collected > 0 {
            debug!(collected, remaining = store.len(), "sweep");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn test_load_config_bad_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[limits\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("loading config"), "{err}");
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secnote.toml");
        std::fs::write(&path, "[limits]\nmax_note_size = 1024\n").unwrap();
        let config = load_config(&path).unwrap().unwrap();
        assert_eq!(config.limits.max_note_size, 1024);
    }
}
