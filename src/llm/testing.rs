//! Scripted model runtime for tests

use async_trait::async_trait;
use std::sync::Mutex;

use super::cache::ModelHandle;
use super::error::{AcquisitionError, InferenceError};
use super::runtime::ModelRuntime;

/// Runtime double answering prompts from a script.
///
/// `complete` replies with the first rule whose keys all occur in the prompt.
/// `generate` emits the scripted tokens, or fails like Ollama does for a
/// model that is not installed.
#[derive(Default)]
pub struct ScriptedRuntime {
    rules: Vec<(Vec<String>, String)>,
    tokens: Option<Vec<String>>,
    generate_error: Option<String>,
    models: Vec<String>,
    list_fails: bool,
    pull_lines: Vec<String>,
    pull_fails: bool,
    prompts: Mutex<Vec<String>>,
    pulls: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply `answer` to any `complete` prompt containing `key`
    pub fn answer(self, key: &str, answer: &str) -> Self {
        self.answer_when(&[key], answer)
    }

    /// Reply `answer` to prompts containing every one of `keys`
    pub fn answer_when(mut self, keys: &[&str], answer: &str) -> Self {
        self.rules.push((
            keys.iter().map(|k| k.to_string()).collect(),
            answer.to_string(),
        ));
        self
    }

    pub fn tokens(mut self, tokens: &[&str]) -> Self {
        self.tokens = Some(tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Make `generate` fail with a runtime error carrying `message`
    pub fn generate_fails(mut self, message: &str) -> Self {
        self.generate_error = Some(message.to_string());
        self
    }

    pub fn models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn list_fails(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub fn pull_lines(mut self, lines: &[&str]) -> Self {
        self.pull_lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn pull_fails(mut self) -> Self {
        self.pull_fails = true;
        self
    }

    /// Prompts seen by `complete` and `generate`, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of prompts containing `key`
    pub fn calls_with(&self, key: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(key)).count()
    }

    /// Models passed to `pull`
    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<(), InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(message) = &self.generate_error {
            return Err(InferenceError::Runtime {
                status: 404,
                message: message.clone(),
            });
        }

        match &self.tokens {
            Some(tokens) => {
                for token in tokens {
                    on_token(token);
                    tokio::task::yield_now().await;
                }
                Ok(())
            }
            None => Err(InferenceError::Runtime {
                status: 404,
                message: format!("model '{}' not found, try pulling it first", handle.model),
            }),
        }
    }

    async fn complete(&self, _handle: &ModelHandle, prompt: &str) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        self.rules
            .iter()
            .find(|(keys, _)| keys.iter().all(|k| prompt.contains(k.as_str())))
            .map(|(_, answer)| answer.clone())
            .ok_or_else(|| InferenceError::Runtime {
                status: 500,
                message: "no scripted answer".to_string(),
            })
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        if self.list_fails {
            return Err(InferenceError::Unavailable("scripted".to_string()));
        }
        Ok(self.models.clone())
    }

    async fn pull(
        &self,
        model: &str,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<(), AcquisitionError> {
        self.pulls.lock().unwrap().push(model.to_string());

        for line in &self.pull_lines {
            on_line(line.clone());
        }

        if self.pull_fails {
            Err(AcquisitionError::Exit { code: Some(1) })
        } else {
            Ok(())
        }
    }
}
