#![forbid(unsafe_code)]

//! `browser-relay` server binary.
//!
//! Bootstraps configuration, connects the database, starts the worker
//! bridge, and serves the HTTP surface until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use browser_relay::bridge::Bridge;
use browser_relay::config::Config;
use browser_relay::content::{ContentStore, DiffEngine};
use browser_relay::http::{router, AppState};
use browser_relay::persistence::console_repo::ConsoleRepo;
use browser_relay::persistence::cursor_repo::CursorRepo;
use browser_relay::persistence::db;
use browser_relay::persistence::record_repo::RecordRepo;
use browser_relay::persistence::session_repo::SessionRepo;
use browser_relay::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "browser-relay", about = "HTTP relay for a Playwright MCP worker", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run the browser headless, overriding the config file.
    #[arg(long)]
    headless: bool,

    /// HTTP port override.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format);
    info!("browser-relay server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| AppError::Config(format!("cannot read config: {err}")))?;
            Config::from_toml_str(&text)?
        }
        None => Config::from_env()?,
    };
    if args.headless {
        config.worker.headless = true;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let pool = Arc::new(db::connect(&config.database_path).await?);
    info!(path = %config.database_path.display(), "database connected");

    let records = RecordRepo::new(Arc::clone(&pool));
    let cursors = CursorRepo::new(Arc::clone(&pool));
    let console = ConsoleRepo::new(Arc::clone(&pool));
    let sessions = SessionRepo::new(Arc::clone(&pool));
    let diff = DiffEngine::new(records.clone(), cursors);
    let store = ContentStore::new(records, console, diff);

    // ── Start the worker bridge ─────────────────────────
    let bridge = Arc::new(Bridge::new(Arc::clone(&config)));
    bridge.start().await?;
    info!("worker bridge started");

    // ── Serve HTTP ──────────────────────────────────────
    let state = AppState {
        config: Arc::clone(&config),
        bridge: Arc::clone(&bridge),
        store,
        sessions,
    };
    let app = router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| AppError::Config(format!("cannot bind {addr}: {err}")))?;
    info!(%addr, "relay listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = serve.await {
        error!(%err, "http server error");
    }

    // ── Graceful shutdown ───────────────────────────────
    info!("shutdown signal received");
    bridge.stop().await;
    pool.close().await;
    info!("browser-relay shut down");

    Ok(())
}

/// Resolve when the process receives Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(signal) => signal,
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            () = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => fmt().with_env_filter(filter).init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).init(),
    }
}
