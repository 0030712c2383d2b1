//! Model runtime interface and its Ollama implementation
//!
//! Generation and model listing go over Ollama's REST API; pulling a model
//! shells out to the `ollama` binary and relays its terminal output.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::cache::ModelHandle;
use super::error::{AcquisitionError, InferenceError};
use super::progress::LineSplitter;

/// Everything the backend needs from a model runtime
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Stream a completion, calling `on_token` for every chunk
    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<(), InferenceError>;

    /// Complete a prompt and return the whole answer
    async fn complete(&self, handle: &ModelHandle, prompt: &str) -> Result<String, InferenceError>;

    /// Names of the locally installed models
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;

    /// Download a model, calling `on_line` for every line of progress output
    async fn pull(
        &self,
        model: &str,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<(), AcquisitionError>;
}

/// Whether `model` is among `installed`, allowing for the implicit `:latest` tag
pub fn is_installed(installed: &[String], model: &str) -> bool {
    installed
        .iter()
        .any(|name| name == model || *name == format!("{}:latest", model))
}

/// Configuration for the Ollama runtime
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server (e.g., "http://localhost:11434")
    pub base_url: String,
    /// Binary used for `pull`
    pub binary: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            binary: "ollama".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

impl OllamaConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            base_url: config.model.ollama_url.clone(),
            binary: config.model.ollama_binary.clone(),
            ..Self::default()
        }
    }
}

/// Ollama-backed [`ModelRuntime`]
pub struct OllamaRuntime {
    client: Client,
    config: OllamaConfig,
}

impl OllamaRuntime {
    pub fn new(config: OllamaConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let body = GenerateRequest {
            model: &handle.model,
            prompt,
            stream,
            options: GenerateOptions {
                temperature: handle.options.temperature,
            },
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(e, &self.config.base_url))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(runtime_error(response).await)
        }
    }
}

#[async_trait]
impl ModelRuntime for OllamaRuntime {
    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<(), InferenceError> {
        let response = self.post_generate(handle, prompt, true).await?;

        let mut body = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| InferenceError::from_transport(e, &self.config.base_url))?;
            pending.extend_from_slice(&chunk);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if handle_line(&line, on_token)? {
                    return Ok(());
                }
            }
        }

        if !pending.is_empty() {
            handle_line(&pending, on_token)?;
        }
        Ok(())
    }

    async fn complete(&self, handle: &ModelHandle, prompt: &str) -> Result<String, InferenceError> {
        let response = self.post_generate(handle, prompt, false).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;

        match chunk.error {
            Some(message) => Err(InferenceError::Runtime {
                status: 500,
                message,
            }),
            None => Ok(chunk.response),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(e, &self.config.base_url))?;

        if !response.status().is_success() {
            return Err(runtime_error(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull(
        &self,
        model: &str,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<(), AcquisitionError> {
        tracing::info!(model = %model, binary = %self.config.binary, "Pulling model");

        let mut child = Command::new(&self.config.binary)
            .arg("pull")
            .arg(model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AcquisitionError::Spawn {
                binary: self.config.binary.clone(),
                source,
            })?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut stdout_done = stdout.is_none();
        let mut stderr_done = stderr.is_none();

        let mut stdout_chunk = vec![0u8; 4096];
        let mut stderr_chunk = vec![0u8; 4096];
        let mut stdout_lines = LineSplitter::new();
        let mut stderr_lines = LineSplitter::new();

        // ollama draws its progress bar on stderr
        while !stdout_done || !stderr_done {
            tokio::select! {
                read = async {
                    match stdout.as_mut() {
                        Some(reader) => reader.read(&mut stdout_chunk).await,
                        None => Ok(0),
                    }
                }, if !stdout_done => {
                    let read = read?;
                    if read == 0 {
                        stdout_done = true;
                    } else {
                        for line in stdout_lines.push(&stdout_chunk[..read]) {
                            on_line(line);
                        }
                    }
                }
                read = async {
                    match stderr.as_mut() {
                        Some(reader) => reader.read(&mut stderr_chunk).await,
                        None => Ok(0),
                    }
                }, if !stderr_done => {
                    let read = read?;
                    if read == 0 {
                        stderr_done = true;
                    } else {
                        for line in stderr_lines.push(&stderr_chunk[..read]) {
                            on_line(line);
                        }
                    }
                }
            }
        }

        for line in [stdout_lines.finish(), stderr_lines.finish()].into_iter().flatten() {
            on_line(line);
        }

        let status = child.wait().await?;
        if status.success() {
            tracing::info!(model = %model, "Model pulled");
            Ok(())
        } else {
            Err(AcquisitionError::Exit {
                code: status.code(),
            })
        }
    }
}

/// Decode one NDJSON line, returning whether generation is done
fn handle_line(
    line: &[u8],
    on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
) -> Result<bool, InferenceError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }

    let chunk: GenerateChunk =
        serde_json::from_str(line).map_err(|e| InferenceError::Malformed(e.to_string()))?;

    if let Some(message) = chunk.error {
        return Err(InferenceError::Runtime {
            status: 500,
            message,
        });
    }
    if !chunk.response.is_empty() {
        on_token(&chunk.response);
    }
    Ok(chunk.done)
}

async fn runtime_error(response: reqwest::Response) -> InferenceError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    InferenceError::Runtime { status, message }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
