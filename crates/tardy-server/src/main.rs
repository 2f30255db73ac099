#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::handler::{AppState, router};
use server::telemetry::{TelemetryProviders, init_telemetry};
use std::sync::Arc;
use tardy::{Engine, ProcessingRequest, TaskSimulator, WorkerPool};
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let mut engine = Engine::new(config.engine.clone());
    let pool = if config.num_workers > 0 {
        let pool = Arc::new(WorkerPool::<TaskSimulator>::spawn(
            config.num_workers,
            config.work_queue_size,
            config.shutdown_timeout,
        )?);
        engine = engine.with_pool(Arc::clone(&pool));
        Some(pool)
    } else {
        None
    };

    let state = AppState::new(
        Arc::new(engine),
        ProcessingRequest::new(&config.default_request_id, &config.default_content),
    );

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config.server_addr, &config);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(pool, providers))
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(_addr: &str, _config: &ServerConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting tardy on http://{} with full config: {:#?}",
            _addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting tardy on http://{} with {} steps per request and a {:?} budget",
            _addr,
            _config.engine.step_count(),
            _config.engine.budget().total()
        );
    }
}

async fn shutdown_signal(
    pool: Option<Arc<WorkerPool<TaskSimulator>>>,
    providers: TelemetryProviders,
) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");

    // Pooled workers finish what they already hold; per-request loops drain
    // on their own.
    if let Some(pool) = pool {
        pool.shutdown().await;
    }

    providers.shutdown();
}
