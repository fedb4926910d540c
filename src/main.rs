use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use retail_pulse::{
    app_state::AppState,
    config::{AppConfig, PersistenceMode},
    db::{self, queries, MemoryGateway, PersistenceGateway, PgGateway},
    routes,
    services::analyzer::HttpImageAnalyzer,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(persistence = ?config.persistence, "Initializing retail-pulse server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    let gateway = connect_gateway(&config).await;

    let analyzer =
        HttpImageAnalyzer::new().with_delay(Duration::from_millis(config.analyzer_delay_ms));

    let state = AppState::new(gateway, Arc::new(analyzer), config.max_concurrent_visits);
    let jobs = state.jobs.clone();

    let app = Router::new()
        .merge(routes::api_router(state))
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!(
        bind_addr = %config.bind_addr,
        max_concurrent_visits = config.max_concurrent_visits,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!(jobs = jobs.registry().in_flight(), "Draining in-flight jobs");
    jobs.drain().await;
    tracing::info!("Shutdown complete");
}

async fn connect_gateway(config: &AppConfig) -> Arc<dyn PersistenceGateway> {
    let stores = config.seed_stores();

    match config.persistence {
        PersistenceMode::Memory => {
            tracing::info!(stores = stores.len(), "Using in-memory persistence");
            Arc::new(MemoryGateway::with_stores(stores))
        }
        PersistenceMode::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL is required when PERSISTENCE=postgres");

            tracing::info!("Connecting to PostgreSQL database");
            let pool = db::init_pool(database_url, config.db_max_connections)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            for store in &stores {
                queries::upsert_store(&pool, store)
                    .await
                    .expect("Failed to seed store");
            }

            Arc::new(PgGateway::new(pool))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
