use std::path::Path;
use std::sync::Arc;

use discovery_sync::event_channel;
use discovery_sync::init_sled_upstream_db;
use discovery_sync::start_server;
use discovery_sync::utils::file_io::open_file_for_append;
use discovery_sync::ConnectorFactory;
use discovery_sync::DefaultDiscoveryProcessor;
use discovery_sync::DiscoveryNodeConfig;
use discovery_sync::DiscoveryProcessor;
use discovery_sync::Error;
use discovery_sync::ListenerRegistry;
use discovery_sync::LoggingSubscriber;
use discovery_sync::MemoryUpstreamStore;
use discovery_sync::RegistrationManager;
use discovery_sync::Result;
use discovery_sync::SledUpstreamStore;
use discovery_sync::StorageBackend;
use discovery_sync::StorageConfig;
use discovery_sync::UpstreamStore;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = DiscoveryNodeConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.log_dir)?;
    info!(?config, "configuration loaded");

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if config.monitoring.prometheus_enabled {
        tokio::spawn(start_server(
            config.monitoring.prometheus_port,
            graceful_rx.clone(),
        ));
    }

    let (publisher, mut dispatcher) = event_channel(config.discovery.event_channel_capacity);
    dispatcher.subscribe(Arc::new(LoggingSubscriber));
    let dispatcher_handle = tokio::spawn(dispatcher.run(graceful_rx.clone()));

    let processor = Arc::new(DefaultDiscoveryProcessor::new(
        RegistrationManager::new(Arc::new(ConnectorFactory::with_builtin())),
        ListenerRegistry::new(),
        build_store(&config.storage)?,
        Arc::new(publisher),
        config.discovery.clone(),
    ));

    // registry and store calls block; keep them off the runtime workers
    let registrations = config.registrations.clone();
    let bootstrap = processor.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        for registration in &registrations {
            bootstrap.create_discovery(registration)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Fatal(format!("bootstrap task failed: {}", e)))??;

    info!("Application started. Waiting for CTRL+C signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = dispatcher_handle.await {
        error!("event dispatcher stops: {:?}", e);
    }

    let registrations = config.registrations;
    let teardown = processor.clone();
    let _ = tokio::task::spawn_blocking(move || {
        for registration in &registrations {
            if let Err(e) = teardown.remove_discovery(registration) {
                error!(discovery_id = %registration.id, "failed to remove discovery: {:?}", e);
            }
        }
    })
    .await;

    println!("Exiting program.");
    Ok(())
}

fn build_store(storage: &StorageConfig) -> Result<Arc<dyn UpstreamStore>> {
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryUpstreamStore::new())),
        StorageBackend::Sled => {
            let db = init_sled_upstream_db(&storage.db_root_dir)?;
            Ok(Arc::new(SledUpstreamStore::new(&db)?))
        }
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("Failed to listen for SIGINT: {}", e)))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("Failed to listen for SIGTERM: {}", e)))?;
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

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

pub fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(log_dir.join("discovery.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
