//! Inference sessions
//!
//! - **orchestrator**: per-request streaming answer with fallback
//! - **acquisition**: pulling a missing model while the client watches
//! - **context**: relevant memories rendered into the prompt
//! - **language**: reply language resolution

pub mod acquisition;
pub mod context;
pub mod language;
pub mod orchestrator;

pub use acquisition::{acquire, DOWNLOAD_COMPLETE, DOWNLOAD_NOTICE};
pub use language::{resolve_language, LanguageDetector, ScriptDetector};
pub use orchestrator::{InferenceOrchestrator, QueryRequest, SessionSettings};
