//! Model runtime error types

use thiserror::Error;

/// Errors raised while generating text
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Nothing is listening at the runtime address
    #[error("Model runtime unavailable at {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The runtime answered with an error (e.g. model not installed)
    #[error("Runtime error {status}: {message}")]
    Runtime { status: u16, message: String },

    /// A response line did not decode
    #[error("Malformed runtime output: {0}")]
    Malformed(String),

    #[error("Request timeout")]
    Timeout,
}

impl InferenceError {
    pub(crate) fn from_transport(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout
        } else if err.is_connect() {
            InferenceError::Unavailable(base_url.to_string())
        } else {
            InferenceError::Request(err)
        }
    }
}

/// Errors raised while pulling a model
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Failed to start `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pull exited with {}", .code.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()))]
    Exit { code: Option<i32> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = InferenceError::Runtime {
            status: 404,
            message: "model 'm1' not found".to_string(),
        };
        assert_eq!(err.to_string(), "Runtime error 404: model 'm1' not found");

        assert_eq!(
            AcquisitionError::Exit { code: Some(1) }.to_string(),
            "Pull exited with status 1"
        );
        assert_eq!(
            AcquisitionError::Exit { code: None }.to_string(),
            "Pull exited with a signal"
        );
    }
}
