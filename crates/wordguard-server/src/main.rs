//! WordGuard Server
//!
//! Screens short user messages against a shared forbidden-word lexicon and
//! each user's own sensitive phrases.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};
use wordguard_server::{create_router, AppState, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting WordGuard server");

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded");
    info!("Database: {}", config.database_url);
    info!(
        "Similarity threshold: {}",
        config.similarity.default_threshold
    );

    let metrics_handle = init_metrics()?;

    let state = AppState::from_config(&config, metrics_handle).await?;
    info!("Application state initialized");

    let addr: SocketAddr = config.bind_address().parse()?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("wordguard=debug,wordguard_server=debug,wordguard_lexicon=debug,wordguard_similarity=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("wordguard=info,wordguard_server=info,wordguard_lexicon=info,wordguard_similarity=info")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!("wordguard_checks_total", "Messages checked against the lexicon");
    metrics::describe_counter!("wordguard_blocked_total", "Messages blocked by the lexicon");
    metrics::describe_counter!(
        "wordguard_unchecked_total",
        "Messages passed because no lexicon was loaded"
    );
    metrics::describe_histogram!(
        "wordguard_check_latency_us",
        metrics::Unit::Microseconds,
        "Lexicon check latency in microseconds"
    );
    metrics::describe_counter!(
        "wordguard_lexicon_rebuilds_total",
        "Lexicon automaton rebuilds"
    );
    metrics::describe_counter!(
        "wordguard_similarity_checks_total",
        "Similarity checks performed"
    );
    metrics::describe_counter!(
        "wordguard_similarity_matches_total",
        "Similarity checks at or above threshold"
    );
    metrics::describe_histogram!(
        "wordguard_similarity_latency_us",
        metrics::Unit::Microseconds,
        "Similarity check latency in microseconds"
    );
    metrics::describe_counter!("wordguard_errors_total", "Requests that failed internally");

    info!("Metrics exporter initialized");
    Ok(handle)
}
