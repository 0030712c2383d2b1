//! GemmaTalk API Server
//!
//! Run with: cargo run --bin gemmatalk
//!
//! # Configuration
//!
//! Settings come from the first config file found among `$GEMMATALK_CONFIG`,
//! `<config dir>/gemmatalk/config.toml` and `./config.toml`. Environment
//! variables override individual values:
//! - `GEMMATALK_HOST`, `GEMMATALK_PORT`: bind address (default: 127.0.0.1:8000)
//! - `GEMMATALK_DATA_DIR`: directory holding the database
//! - `GEMMATALK_OLLAMA_URL`: Ollama server (default: http://localhost:11434)
//! - `GEMMATALK_MODEL`: default chat model
//! - `GEMMATALK_LANGUAGE`: default answer language
//! - `GEMMATALK_LOG_LEVEL`, `GEMMATALK_LOG_FORMAT`: logging (`pretty` or `json`)
//! - `RUST_LOG`: full filter directive, wins over the configured level

use gemmatalk::api::{serve, AppState};
use gemmatalk::config::{Config, LoggingConfig};
use gemmatalk::llm::{ModelRuntime, OllamaConfig, OllamaRuntime};
use gemmatalk::store::{MemoryStore, StoreConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();
    init_tracing(&config.logging);

    tracing::info!("Starting GemmaTalk API server v{}", env!("CARGO_PKG_VERSION"));

    // Open the memory store
    let store_config = StoreConfig {
        path: config.storage.database_path(),
        lifecycle: config.memory.buffer_lifecycle,
        busy_timeout_ms: config.storage.busy_timeout_ms,
    };
    tracing::info!(path = ?store_config.path, "Opening memory store");
    let store = Arc::new(MemoryStore::open(store_config)?);

    // Connect the model runtime
    let runtime = Arc::new(OllamaRuntime::new(OllamaConfig::from_config(&config))?);
    match runtime.list_models().await {
        Ok(models) => tracing::info!(installed = models.len(), "Ollama connection verified"),
        Err(e) => tracing::warn!("Ollama not available: {} (answers will fail until it starts)", e),
    }

    tracing::info!(
        default_model = %config.model.default_model,
        classifier_model = %config.model.classifier_model(),
        schema = ?config.memory.schema,
        mood_strategy = ?config.session.mood_strategy,
        "Session settings"
    );

    let state = AppState::new(store, runtime, &config);

    tracing::info!("Starting server on {}:{}", config.api.host, config.api.port);
    serve(state).await?;

    tracing::info!("GemmaTalk API server stopped");
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level for this crate
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("gemmatalk={},tower_http=debug", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
