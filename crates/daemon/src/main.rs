mod metrics;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediaflow_core::{
    build_pipelines, load_config, validate_config, Executor, LifecycleEvent, LifecycleEventKind,
    PollingScheduler,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MEDIAFLOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!(
        "Executor '{}': {} threads, comparer {:?}, abort_pipeline_on_error={}, die_on_exception={}",
        config.executor.name,
        config.executor.thread_count,
        config.executor.comparer,
        config.executor.abort_pipeline_on_error,
        config.executor.die_on_exception
    );

    // Build pipelines
    let pipelines = build_pipelines(&config.pipelines).context("Failed to build pipelines")?;
    info!("Built {} pipeline(s)", pipelines.len());

    // Create executor and watch for its Stop event
    let executor =
        Arc::new(Executor::new(config.executor.clone()).context("Failed to create executor")?);
    let stopped = Arc::new(Notify::new());
    let stopped_signal = Arc::clone(&stopped);
    executor.subscribe(Arc::new(move |sender: &str, event: &LifecycleEvent| {
        match event.kind {
            LifecycleEventKind::SourceExecutionFinished => {
                info!(executor = sender, source = event.source_name(), "Processed");
            }
            LifecycleEventKind::Stop => stopped_signal.notify_one(),
            _ => {}
        }
    }));

    executor
        .initialize(pipelines)
        .context("Failed to start executor")?;

    // Start scheduler if configured
    let scheduler = match &config.scheduler {
        Some(scheduler_config) => {
            let scheduler = PollingScheduler::new(scheduler_config.clone(), Arc::clone(&executor));
            if let Err(e) = scheduler.start().await {
                stop_executor(&executor).await;
                return Err(e).context("Failed to start scheduler");
            }
            Some(scheduler)
        }
        None => {
            warn!("No scheduler configured, nothing will feed the executor");
            None
        }
    };

    // Run until a shutdown signal or until the executor stops on its own
    let died = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            false
        }
        _ = stopped.notified() => true,
    };

    if let Some(ref scheduler) = scheduler {
        scheduler.stop().await;
    }
    stop_executor(&executor).await;

    let status = executor.status();
    info!(
        added = status.total_added,
        finished = status.total_finished,
        failed = status.total_failed,
        "Executor stopped"
    );

    if let Some(ref path) = config.daemon.metrics_file {
        match metrics::write_metrics_file(path) {
            Ok(()) => info!("Metrics written to {:?}", path),
            Err(e) => error!("{:#}", e),
        }
    }

    if died {
        return Err(anyhow!(
            "executor '{}' stopped after a job failure",
            executor.name()
        ));
    }
    Ok(())
}

/// Stop the executor off the async runtime; it joins OS threads.
async fn stop_executor(executor: &Arc<Executor>) {
    let executor = Arc::clone(executor);
    if let Err(e) = tokio::task::spawn_blocking(move || executor.stop()).await {
        error!("Executor stop task failed: {}", e);
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
