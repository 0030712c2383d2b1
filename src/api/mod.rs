//! GemmaTalk REST API
//!
//! HTTP API layer for the desktop UI, built with Axum.
//!
//! # Endpoints
//!
//! ## Chat
//! - `POST /stream` - Stream an answer (raw chunks or SSE)
//! - `GET /models` - Models available to the UI
//! - `POST /process_conversations` - Classify buffered turns
//!
//! ## Mood
//! - `GET /mood` - Mood log
//! - `POST /mood` - Log a mood
//! - `DELETE /mood` - Clear the log
//! - `GET /mood_summary` - Today's summary and tips
//!
//! ## Memories
//! - `GET|PUT|DELETE /special_memory` - Special memories
//! - `GET|PUT|DELETE /memory` - Any memory table
//!
//! ## Data
//! - `GET /export_data` - CSV export
//! - `DELETE /clear_data` - Wipe the database
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use gemmatalk::api::{serve, AppState};
//! use gemmatalk::config::Config;
//! use gemmatalk::llm::{OllamaConfig, OllamaRuntime};
//! use gemmatalk::store::{MemoryStore, StoreConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let store = Arc::new(MemoryStore::open(StoreConfig::new(config.storage.database_path()))?);
//!     let runtime = Arc::new(OllamaRuntime::new(OllamaConfig::from_config(&config))?);
//!
//!     serve(AppState::new(store, runtime, &config)).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiSettings, AppState};

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Chat routes
        .route("/stream", post(routes::stream::stream_answer))
        .route("/models", get(routes::models::list_models))
        .route(
            "/process_conversations",
            post(routes::conversations::process_conversations),
        )
        // Mood routes
        .route(
            "/mood",
            get(routes::mood::list_moods)
                .post(routes::mood::log_mood)
                .delete(routes::mood::clear_moods),
        )
        .route("/mood_summary", get(routes::summary::today_summary))
        // Memory routes
        .route(
            "/special_memory",
            get(routes::memory::list_special)
                .put(routes::memory::update_special)
                .delete(routes::memory::delete_special),
        )
        .route(
            "/memory",
            get(routes::memory::list_memories)
                .put(routes::memory::update_memory)
                .delete(routes::memory::delete_memory),
        )
        // Data routes
        .route("/export_data", get(routes::export::export_data))
        .route("/clear_data", axum::routing::delete(routes::data::clear_data));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .merge(api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Permissive unless origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let cache = Arc::clone(&state.cache);
    let addr = state.config.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("GemmaTalk API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    let released = cache.clear().await;
    tracing::info!(released, "GemmaTalk API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
