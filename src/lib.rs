//! # GemmaTalk
//!
//! Backend for a local, private chat companion. Answers are streamed from a
//! model served by Ollama, and conversations are mined in the background for
//! facts, moods and a daily summary that feed later answers.
//!
//! ## Modules
//!
//! - [`store`]: SQLite memory store (memories, conversation buffer, summaries, moods)
//! - [`stream`]: per-request token sessions and mood tag stripping
//! - [`llm`]: model runtime trait, Ollama client, model cache, prompts
//! - [`inference`]: answers one chat request end to end
//! - [`classify`]: background classification of buffered turns
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gemmatalk::config::Config;
//! use gemmatalk::inference::{InferenceOrchestrator, QueryRequest, SessionSettings};
//! use gemmatalk::llm::{ModelCache, OllamaConfig, OllamaRuntime};
//! use gemmatalk::store::{MemoryStore, StoreConfig};
//! use futures_util::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let store = Arc::new(MemoryStore::open(StoreConfig::new(config.storage.database_path()))?);
//!     let runtime = Arc::new(OllamaRuntime::new(OllamaConfig::from_config(&config))?);
//!
//!     let orchestrator = InferenceOrchestrator::new(
//!         runtime,
//!         store,
//!         Arc::new(ModelCache::default()),
//!         SessionSettings::from_config(&config),
//!     );
//!
//!     let request = QueryRequest {
//!         question: "What should I cook tonight?".to_string(),
//!         ..QueryRequest::default()
//!     };
//!     let mut tokens = std::pin::pin!(orchestrator.run_query(request).into_stream());
//!     while let Some(token) = tokens.next().await {
//!         print!("{}", token);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod classify;
pub mod config;
pub mod inference;
pub mod llm;
pub mod store;
pub mod stream;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, ApiSettings, AppState};

pub use classify::{ClassificationPipeline, PipelineError, PipelineSettings, ProcessReport};

pub use config::{Config, ConfigError, LoggingConfig, MoodStrategy, StreamFormat};

pub use inference::{InferenceOrchestrator, QueryRequest, SessionSettings};

pub use llm::{InferenceError, ModelCache, ModelRuntime, OllamaConfig, OllamaRuntime};

pub use store::{
    BufferLifecycle, MemoryKind, MemoryRecord, MemorySchema, MemoryStore, Mood, StoreConfig,
    StoreError, StoreResult,
};

pub use stream::{SessionState, TokenSink, TokenStream};
