//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::classify::{ClassificationPipeline, PipelineSettings};
use crate::config::{Config, StreamFormat};
use crate::inference::{InferenceOrchestrator, SessionSettings};
use crate::llm::{ModelCache, ModelOptions, ModelRuntime};
use crate::store::MemoryStore;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Memory store shared by every request
    pub store: Arc<MemoryStore>,
    /// Model runtime (Ollama in production)
    pub runtime: Arc<dyn ModelRuntime>,
    /// Process-scoped model handles
    pub cache: Arc<ModelCache>,
    pub orchestrator: InferenceOrchestrator,
    pub pipeline: Arc<ClassificationPipeline>,
    /// API configuration
    pub config: Arc<ApiSettings>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the orchestrator and pipeline around one store, runtime and cache
    pub fn new(store: Arc<MemoryStore>, runtime: Arc<dyn ModelRuntime>, config: &Config) -> Self {
        let cache = Arc::new(ModelCache::new(ModelOptions {
            temperature: config.model.temperature,
        }));

        let orchestrator = InferenceOrchestrator::new(
            Arc::clone(&runtime),
            Arc::clone(&store),
            Arc::clone(&cache),
            SessionSettings::from_config(config),
        );
        let pipeline = Arc::new(ClassificationPipeline::new(
            Arc::clone(&runtime),
            Arc::clone(&store),
            Arc::clone(&cache),
            PipelineSettings::from_config(config),
        ));

        Self {
            store,
            runtime,
            cache,
            orchestrator,
            pipeline,
            config: Arc::new(ApiSettings::from_config(config)),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server settings
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins, empty for any
    pub cors_origins: Vec<String>,
    /// Default framing for `/stream`
    pub stream_format: StreamFormat,
    /// Fallback for `/models`
    pub known_models: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ApiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.api.host.clone(),
            port: config.api.port,
            cors_origins: config.api.cors_origins.clone(),
            stream_format: config.api.stream_format,
            known_models: config.model.known_models.clone(),
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
