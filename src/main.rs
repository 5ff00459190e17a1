//! Model Cache - admin server
//!
//! Runs a cache instance over in-memory models and exposes the admin API.

use std::net::SocketAddr;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_cache::api::create_router;
use model_cache::memory::demo_models;
use model_cache::{AppState, CacheConfiguration, Config, ModelCache, ModelConfig};

/// Main entry point for the model cache admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache from the model configuration file
/// 4. Wrap an in-memory model for every configured model
/// 5. Start the heartbeat task if configured
/// 6. Serve the admin router on the configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting model cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: verbose={}, heartbeat={}s, port={}, models={:?}",
        config.verbose, config.heartbeat_interval, config.admin_port, config.config_path
    );

    let models = match config.load_models() {
        Ok(models) => models,
        Err(e) => {
            error!("Failed to load model configuration: {}", e);
            std::process::exit(1);
        }
    };

    let models = if models.is_empty() {
        info!("No model configuration given, caching demo models User and Post");
        CacheConfiguration::new()
            .with_model("User", ModelConfig::new())
            .with_model("Post", ModelConfig::new())
    } else {
        models
    };

    let cache = ModelCache::new(models, config.cache_options());
    let seeded = demo_models(&cache.models());
    info!("Cache initialized for {} seeded models", seeded.len());

    let heartbeat = cache.start_heartbeat();
    if heartbeat.is_some() {
        info!("Heartbeat task started");
    }

    let app = create_router(AppState::with_models(cache, seeded));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Admin API listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(heartbeat))
        .await
    {
        error!("Server error: {}", e);
    }

    info!("Shutdown complete");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the heartbeat task and allows graceful shutdown.
async fn shutdown_signal(heartbeat: Option<tokio::task::JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = heartbeat {
        handle.abort();
        warn!("Heartbeat task aborted");
    }
}
