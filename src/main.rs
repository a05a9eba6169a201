//! RoonPipe daemon and interactive client

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use roonpipe::adapters::{RoonAdapter, RoonSettings};
use roonpipe::config::{load_config, Config};
use roonpipe::images::ImageCache;
use roonpipe::ipc::{is_instance_running, IpcClient, IpcServer};
use roonpipe::navigator::Navigator;
use roonpipe::notify::{NotifySend, TrackNotifier};
use roonpipe::zones::ZoneTracker;

/// Search Roon from the desktop and play results on the active zone.
#[derive(Parser, Debug)]
#[command(name = "roonpipe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run the interactive search client instead of the daemon.
    #[arg(long)]
    cli: bool,

    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Daemon socket path (overrides config file).
    #[arg(short, long, value_name = "PATH", env = "ROONPIPE_SOCKET")]
    socket: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "roonpipe=trace").
    #[arg(short, long, env = "ROONPIPE_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let default_filter = args
        .log_level
        .clone()
        .unwrap_or_else(|| "roonpipe=info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }

    if args.cli {
        return roonpipe::cli::run(IpcClient::new(&config.socket_path)).await;
    }

    run_daemon(config).await
}

async fn run_daemon(config: Config) -> Result<()> {
    tracing::info!("Starting RoonPipe v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?config, "Configuration loaded");

    if is_instance_running(&config.socket_path).await {
        tracing::error!(
            "Another RoonPipe instance is already listening on {}",
            config.socket_path.display()
        );
        std::process::exit(1);
    }

    let shutdown = CancellationToken::new();
    let zones = ZoneTracker::new();
    let adapter = Arc::new(RoonAdapter::new(
        RoonSettings::from_config(&config.roon, config.search.source),
        zones.clone(),
    ));

    let images = Arc::new(ImageCache::new(
        config.images.cache_dir(),
        config.images.size,
        adapter.clone(),
    ));
    let removed = images.clear_old(config.images.max_age()).await;
    if removed > 0 {
        tracing::info!("Removed {} stale cached images", removed);
    }

    let navigator = Arc::new(
        Navigator::new(adapter.clone(), zones.clone(), images.clone())
            .with_max_per_category(config.search.max_results_per_category),
    );

    let server = IpcServer::bind(&config.socket_path)?;
    tracing::info!("Listening on {}", server.path().display());

    // Subscribe before the adapter can push the first zone snapshot
    if config.notifications.enabled {
        let notifier = TrackNotifier::new(Arc::new(NotifySend), images.clone());
        tokio::spawn(notifier.run(zones.subscribe()));
    }

    let roon_task = {
        let adapter = adapter.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { adapter.run(shutdown).await })
    };

    let server_task = tokio::spawn(server.serve(navigator, shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    if let Some(core) = adapter.core_name().await {
        tracing::info!("Disconnecting from Roon Core: {}", core);
    }
    shutdown.cancel();
    let _ = tokio::join!(roon_task, server_task);

    Ok(())
}
