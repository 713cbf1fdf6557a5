//! Save sync relay
//!
//! Runs the remote authoritative snapshot store that devices sync against.
//!
//! Usage:
//!   savesync-relay --port 4080 [--token SECRET]
//!
//! Snapshots live in memory and are lost on restart.

use anyhow::{Context, Result};
use clap::Parser;
use savesync_relay::{DEFAULT_MAX_SNAPSHOT_BYTES, RelayState, SERVICE_NAME, build_router};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "savesync-relay")]
#[command(about = "Remote snapshot store for save sync")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "4080")]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Require this bearer token on snapshot routes
    #[arg(short, long)]
    token: Option<String>,

    /// Largest accepted snapshot upload, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_SNAPSHOT_BYTES)]
    max_snapshot_bytes: usize,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("{} {} starting...", SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    if args.token.is_none() {
        info!("No token configured, snapshot routes are open");
    }

    let state = RelayState::new(args.token).with_max_snapshot_bytes(args.max_snapshot_bytes);
    let app = build_router(Arc::new(state));
    let address = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;
    Ok(())
}
