//! refsync-server: the thin edge in front of the sync engine.
//!
//! Authenticates and authorizes, then delegates to the session actors
//! and the membership directory. Holds no session state of its own.

use anyhow::{Context, Result};
use clap::Parser;
use refsync_core::config::Config;
use refsync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

use refsync_server::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "refsync-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env()?,
    };
    if let Some(bind) = &args.bind {
        config.server.bind_address = bind
            .parse()
            .with_context(|| format!("bad bind address: {}", bind))?;
    }
    if let Some(data_dir) = args.data_dir {
        config.server.data_dir = data_dir;
    }

    let log_level = LogLevel::from_str(&args.log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        LogLevel::Info
    });
    init_logging_with_config(LogConfig::new(log_level).json_format(args.json_logs))?;

    let bind_address = config.server.bind_address;
    let state = AppState::new(config)?;
    let router = build_router(state);

    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!(%bind_address, "refsync-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("refsync-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install ctrl-c handler");
        return;
    }
    info!("shutdown signal received");
}
