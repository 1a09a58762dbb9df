//! Reactive Flow Tracer - cross-chain callback flow verification
//!
//! Given an origin-chain transaction that should trigger a reactive contract,
//! this service reconstructs the full causal chain (event emission, reactive
//! VM capture, callback, destination execution) from block explorer and
//! reactive network RPC data, and reports the status of every step.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info};

mod api;
mod chain;
mod config;
mod error;
mod flow;
mod metrics;
mod reactive;

use api::AppState;
use chain::{ChainRegistry, EtherscanClient};
use config::Settings;
use flow::MatcherConfig;
use metrics::MetricsServer;
use reactive::ReactiveRpcClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Reactive Flow Tracer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    let registry = Arc::new(ChainRegistry::from_settings(&settings));
    if registry.is_empty() {
        anyhow::bail!("No chains configured");
    }
    info!("Loaded configuration for {} chains", registry.len());

    // Initialize explorer and reactive network clients
    let request_timeout = Duration::from_millis(settings.tracer.request_timeout_ms);
    let explorer = Arc::new(
        EtherscanClient::new(request_timeout).context("Failed to create explorer client")?,
    );
    let reactive = Arc::new(
        ReactiveRpcClient::new(settings.tracer.reactive_rpc_url.clone(), request_timeout)
            .context("Failed to create reactive RPC client")?,
    );
    info!("Reactive RPC endpoint: {}", reactive.url());

    let shutdown = Arc::new(RwLock::new(false));
    let state = AppState {
        registry,
        explorer,
        reactive,
        matcher: MatcherConfig {
            window_secs: settings.tracer.capture_window_secs,
            batch_size: settings.tracer.capture_batch_size,
        },
        shutdown: shutdown.clone(),
    };

    // Start API server
    let api_handle = tokio::spawn({
        let api_config = settings.api.clone();
        async move {
            if let Err(e) = api::run_server(api_config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Reactive Flow Tracer is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // In-flight flows stop at their next stage boundary
    *shutdown.write().await = true;

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Reactive Flow Tracer stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,reactive_flow_tracer=debug,hyper=warn,reqwest=warn")
    });

    let json = std::env::var("TRACER_LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
