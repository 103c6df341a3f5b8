//! VPS Panel daemon
//!
//! Serves the panel API over HTTP and drives simulated VPS lifecycles.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpspanel_daemon::config::{AuthMode, Backend};
use vpspanel_daemon::reconciler::Reconciler;
use vpspanel_daemon::{server, PanelConfig, PanelState};

#[derive(Parser)]
#[command(name = "vpspaneld")]
#[command(about = "VPS Panel daemon - simulated VPS lifecycle and terminal API")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VPSPANEL_CONFIG")]
    config: Option<PathBuf>,

    /// Store directory
    #[arg(short, long, env = "VPSPANEL_STORE")]
    store: Option<PathBuf>,

    /// HTTP listen address
    #[arg(short, long, env = "VPSPANEL_LISTEN")]
    listen: Option<String>,

    /// Storage backend
    #[arg(short, long, value_enum, env = "VPSPANEL_BACKEND")]
    backend: Option<Backend>,

    /// Demo mode: seed demo accounts and provision unknown usernames on sign-in.
    /// Uses the memory backend unless --backend is given.
    #[arg(long)]
    demo: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_logging(debug: bool, json: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn log_server_exit(result: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
        Ok(Ok(())) => info!("HTTP server stopped"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_json);

    info!("VPS Panel daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, then apply command line overrides
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(vpspanel_common::default_config_path);
    let mut config = PanelConfig::load(&config_path)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if cli.demo {
        config.enable_demo(cli.backend);
    } else if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    if cli.write_config {
        config.save(&config_path)?;
        info!("Wrote configuration to {}", config_path.display());
        return Ok(());
    }

    let addr: SocketAddr = config.listen.parse()?;
    if config.backend == Backend::Sqlite {
        tokio::fs::create_dir_all(&config.store_path).await?;
    }
    if config.auth.mode == AuthMode::Demo {
        info!("Demo mode: unknown usernames are provisioned on sign-in");
    }

    let state = PanelState::new(config).await?;

    // Housekeeping
    let reconciler = Reconciler::new(state.clone());
    let reconciler_handle = tokio::spawn(async move { reconciler.run().await });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server_handle = tokio::spawn(server::serve(state.clone(), addr, async move {
        let _ = shutdown_rx.await;
    }));

    // Wait for shutdown signal
    let server_exited = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
        result = &mut server_handle => {
            log_server_exit(result);
            true
        }
    };

    let _ = shutdown_tx.send(());
    if !server_exited {
        // Let in-flight requests drain
        log_server_exit(server_handle.await);
    }
    reconciler_handle.abort();
    state.registry.scheduler().cancel_all();

    info!("Daemon shutdown complete");
    Ok(())
}
