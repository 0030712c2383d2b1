//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `GEMMATALK_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::{BufferLifecycle, MemoryKind, MemorySchema};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Memory store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("gemmatalk").to_string_lossy().to_string())
        .unwrap_or_else(|| "./gemmatalk_data".to_string())
}

fn default_database_file() -> String {
    "gemmatalk.db".to_string()
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl StorageConfig {
    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.database_file)
    }
}

/// How `/stream` frames tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    /// Plain UTF-8 chunks
    #[default]
    Raw,
    /// Server-sent events
    Sse,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub stream_format: StreamFormat,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            stream_format: StreamFormat::default(),
        }
    }
}

/// Model runtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_ollama_binary")]
    pub ollama_binary: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used for the classification calls; defaults to `default_model`
    pub classifier_model: Option<String>,

    /// Seconds the stream waits for the next token
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Reported by `/models` when the runtime cannot be reached
    #[serde(default = "default_known_models")]
    pub known_models: Vec<String>,

    pub temperature: Option<f32>,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_binary() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "gemma3n:e2b".to_string()
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_known_models() -> Vec<String> {
    vec![
        "gemma3n:e2b".to_string(),
        "llama3.2".to_string(),
        "mistral".to_string(),
        "gemma2:2b".to_string(),
    ]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            ollama_binary: default_ollama_binary(),
            default_model: default_model(),
            classifier_model: None,
            idle_timeout_secs: default_idle_timeout(),
            known_models: default_known_models(),
            temperature: None,
        }
    }
}

impl ModelConfig {
    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Memory policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub schema: MemorySchema,

    #[serde(default)]
    pub buffer_lifecycle: BufferLifecycle,

    /// Where a plain "yes" from the significance check is stored
    #[serde(default = "default_positive_kind")]
    pub positive_kind: MemoryKind,

    #[serde(default = "default_relevant_limit")]
    pub relevant_limit: usize,

    /// Order in which memory kinds are added to the prompt context
    #[serde(default = "default_context_priority")]
    pub context_priority: Vec<MemoryKind>,
}

fn default_positive_kind() -> MemoryKind {
    MemoryKind::Core
}

fn default_relevant_limit() -> usize {
    20
}

fn default_context_priority() -> Vec<MemoryKind> {
    vec![MemoryKind::Special, MemoryKind::Core, MemoryKind::General]
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            schema: MemorySchema::default(),
            buffer_lifecycle: BufferLifecycle::default(),
            positive_kind: default_positive_kind(),
            relevant_limit: default_relevant_limit(),
            context_priority: default_context_priority(),
        }
    }
}

/// How the user's mood is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodStrategy {
    /// Separate classification call during processing
    #[default]
    Classifier,
    /// Marker appended by the model to each answer
    InlineTag,
}

/// Chat session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default)]
    pub mood_strategy: MoodStrategy,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_assistant_name() -> String {
    "GemmaTalk".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            assistant_name: default_assistant_name(),
            mood_strategy: MoodStrategy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            std::env::var_os("GEMMATALK_CONFIG").map(PathBuf::from),
            dirs::config_dir().map(|p| p.join("gemmatalk").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("GEMMATALK_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Ok(host) = std::env::var("GEMMATALK_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("GEMMATALK_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(url) = std::env::var("GEMMATALK_OLLAMA_URL") {
            self.model.ollama_url = url;
        }
        if let Ok(model) = std::env::var("GEMMATALK_MODEL") {
            self.model.default_model = model;
        }

        if let Ok(language) = std::env::var("GEMMATALK_LANGUAGE") {
            self.session.default_language = language;
        }

        if let Ok(level) = std::env::var("GEMMATALK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GEMMATALK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# GemmaTalk Configuration
#
# Environment variables override these settings:
# - GEMMATALK_DATA_DIR
# - GEMMATALK_HOST
# - GEMMATALK_PORT
# - GEMMATALK_OLLAMA_URL
# - GEMMATALK_MODEL
# - GEMMATALK_LANGUAGE
# - GEMMATALK_LOG_LEVEL
# - GEMMATALK_LOG_FORMAT

[storage]
# Directory holding the memory database (defaults to the platform data dir)
# data_dir = "/home/me/.local/share/gemmatalk"
database_file = "gemmatalk.db"

# How long a query waits on a locked database (ms)
busy_timeout_ms = 5000

[api]
host = "127.0.0.1"
port = 8000

# Allowed CORS origins (empty allows any origin)
cors_origins = []

# Token framing for /stream: raw or sse
stream_format = "raw"

[model]
ollama_url = "http://localhost:11434"
ollama_binary = "ollama"
default_model = "gemma3n:e2b"

# Model for mood/significance/fact/summary calls (defaults to default_model)
# classifier_model = "gemma3n:e2b"

# Seconds to wait for the next token before closing the stream
idle_timeout_secs = 30

# Reported by /models when Ollama is unreachable
known_models = ["gemma3n:e2b", "llama3.2", "mistral", "gemma2:2b"]

# temperature = 0.7

[memory]
# tiered (core, general, special) or special_only
schema = "tiered"

# delete or consolidate processed conversation turns
buffer_lifecycle = "delete"

# Where "worth remembering" answers are stored: core, general or special
positive_kind = "core"

# Relevant memories per kind added to each prompt
relevant_limit = 20
context_priority = ["special", "core", "general"]

[session]
# Language used when none is given and detection fails
default_language = "en"
assistant_name = "GemmaTalk"

# classifier or inline_tag
mood_strategy = "classifier"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
