use std::path::Path;
use std::sync::Arc;

use lead_ha::utils::file_io::open_file_for_append;
use lead_ha::ClusterRegistry;
use lead_ha::Error;
use lead_ha::FileLockService;
use lead_ha::FileRegistry;
use lead_ha::LeadElector;
use lead_ha::LeadNodeConfig;
use lead_ha::MemRegistry;
use lead_ha::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = LeadNodeConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.node.log_path())?;

    let lock = Arc::new(FileLockService::new(config.election.lock_poll_interval()));
    let res = match &config.election.registry_path {
        Some(path) => run(&config, lock, Arc::new(FileRegistry::open(path)?)).await,
        None => run(&config, lock, Arc::new(MemRegistry::new())).await,
    };
    if let Err(e) = &res {
        error!("lead node stops: {:?}", e);
    }
    res
}

async fn run<R: ClusterRegistry>(
    config: &LeadNodeConfig,
    lock: Arc<FileLockService>,
    registry: Arc<R>,
) -> Result<()> {
    let elector = LeadElector::new(config.node.identity(), config.node.port, lock, registry)
        .with_node_dir(config.node.node_dir.clone());
    elector.notify_when_primary(|identity| info!("{} is now the primary lead", identity));

    let state = elector.start(&config.election, config.election.blocking_start).await?;
    info!("{} started in {}", elector.identity(), state);

    info!("Application started. Waiting for CTRL+C signal...");
    tokio::select! {
        state = elector.wait_until_primary() => {
            if state.is_primary() {
                info!("serving as primary lead");
            }
            graceful_shutdown().await?;
        }
        res = graceful_shutdown() => res?,
    }

    elector.stop().await?;
    info!("Shutdown completed");
    Ok(())
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("cannot install SIGINT handler: {}", e)))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("cannot install SIGTERM handler: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    info!("Shutdown lead node..");
    Ok(())
}

pub fn init_observability(log_path: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(log_path.to_path_buf())
        .map_err(|e| Error::Fatal(format!("cannot open log file {}: {}", log_path.display(), e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
