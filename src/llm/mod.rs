//! Model runtime adapter
//!
//! - **runtime**: the `ModelRuntime` trait and the Ollama implementation
//! - **cache**: process-scoped model handles
//! - **progress**: formatting of `ollama pull` output
//! - **prompt**: prompt templates
//! - **error**: error types

pub mod cache;
pub mod error;
pub mod progress;
pub mod prompt;
pub mod runtime;

#[cfg(test)]
pub mod testing;

pub use cache::{ModelCache, ModelHandle, ModelOptions};
pub use error::{AcquisitionError, InferenceError};
pub use progress::{format_progress_line, LineSplitter};
pub use runtime::{is_installed, ModelRuntime, OllamaConfig, OllamaRuntime};
