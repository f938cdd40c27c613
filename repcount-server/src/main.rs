use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use repcount::config::Config;
use repcount::logging;
use repcount::tracker::Tracker;
use repcount_server::{AppState, router};

#[derive(Parser, Debug)]
#[command(version, about = "Push-up counter HTTP server", long_about = None)]
struct Args {
    /// Address to listen on (overrides REPCOUNT_BIND)
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database path, or ":memory:" (overrides DATABASE_URL)
    #[arg(short, long)]
    database_url: Option<String>,

    /// Pose detection service endpoint (overrides POSE_SERVICE_URL)
    #[arg(long)]
    pose_service_url: Option<String>,

    /// off, error, warn, info, debug or trace (overrides REPCOUNT_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }
    if let Some(url) = args.pose_service_url {
        config.pose_service_url = Some(url);
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    if !logging::set_log_level(&config.log_level) {
        warn!("Unknown log level {:?}, using info", config.log_level);
    }

    let tracker = Arc::new(Tracker::from_config(&config)?);
    let app = router(AppState::new(tracker), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Push-up counter listening on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let terminate = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
