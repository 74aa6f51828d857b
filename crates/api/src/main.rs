//! API server entry point.

use api::config::Config;
use registry::{InMemoryRegistry, PostgresRegistry, RegistryStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: RegistryStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) {
    let state = api::create_default_state(store, config.verify_ttl);

    // Background eviction for expired verification challenges.
    let sweeper = state.verification.spawn_sweeper(config.verify_sweep);

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    sweeper.abort();
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the registry backend
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresRegistry::connect(&url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL registry");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory registry");
            serve(InMemoryRegistry::new(), config, metrics_handle).await;
        }
    }
}
