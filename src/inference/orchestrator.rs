//! Inference Session Orchestrator
//!
//! One call to [`InferenceOrchestrator::run_query`] opens a stream session
//! and spawns its producer:
//!
//! ```text
//! language -> context -> generate ──ok──> persist turns ─────────────┐
//!                            └──err──> model installed? ─yes─> "Error: .."
//!                                          └─no─> notice + pull ──────┤
//!                                                                  End
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, MoodStrategy};
use crate::llm::prompt::ChatPrompt;
use crate::llm::{is_installed, InferenceError, ModelCache, ModelRuntime};
use crate::store::{MemoryKind, MemorySchema, MemoryStore, Sender};
use crate::stream::{extract_mood_tag, session, TokenSink, TokenStream};

use super::acquisition::{self, DOWNLOAD_NOTICE};
use super::context::{build_context, gather_memories};
use super::language::{resolve_language, LanguageDetector, ScriptDetector};

/// A chat request as received from the UI
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub question: String,
    pub user_name: Option<String>,
    pub context: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

/// Session policy resolved from configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_model: String,
    pub default_language: String,
    pub assistant_name: String,
    pub mood_strategy: MoodStrategy,
    pub schema: MemorySchema,
    pub context_priority: Vec<MemoryKind>,
    pub relevant_limit: usize,
    pub idle_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_model: config.model.default_model.clone(),
            default_language: config.session.default_language.clone(),
            assistant_name: config.session.assistant_name.clone(),
            mood_strategy: config.session.mood_strategy,
            schema: config.memory.schema,
            context_priority: config.memory.context_priority.clone(),
            relevant_limit: config.memory.relevant_limit,
            idle_timeout: config.model.idle_timeout(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives one streamed answer per request
#[derive(Clone)]
pub struct InferenceOrchestrator {
    runtime: Arc<dyn ModelRuntime>,
    store: Arc<MemoryStore>,
    cache: Arc<ModelCache>,
    detector: Arc<dyn LanguageDetector>,
    settings: SessionSettings,
}

impl InferenceOrchestrator {
    pub fn new(
        runtime: Arc<dyn ModelRuntime>,
        store: Arc<MemoryStore>,
        cache: Arc<ModelCache>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            runtime,
            store,
            cache,
            detector: Arc::new(ScriptDetector),
            settings,
        }
    }

    /// Builder method: replace the language detector
    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start answering `request`, returning the consumer half at once
    pub fn run_query(&self, request: QueryRequest) -> TokenStream {
        let (sink, stream) = session(self.settings.idle_timeout);
        let this = self.clone();

        tokio::spawn(async move {
            this.produce(request, sink).await;
        });

        stream
    }

    async fn produce(&self, request: QueryRequest, mut sink: TokenSink) {
        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.settings.default_model.as_str())
            .to_string();

        let language = resolve_language(
            request.language.as_deref(),
            &request.question,
            self.detector.as_ref(),
            &self.settings.default_language,
        );

        let memories = gather_memories(
            &self.store,
            self.settings.schema,
            &self.settings.context_priority,
            &request.question,
            self.settings.relevant_limit,
        )
        .await;
        let context = build_context(
            request.user_name.as_deref(),
            request.context.as_deref(),
            &memories,
        );

        let prompt = ChatPrompt {
            assistant_name: &self.settings.assistant_name,
            language: &language,
            context: &context,
            question: &request.question,
            mood_tag: self.settings.mood_strategy == MoodStrategy::InlineTag,
        }
        .render();

        tracing::info!(
            model = %model,
            language = %language,
            memories = memories.iter().map(|(_, r)| r.len()).sum::<usize>(),
            "Generating answer"
        );

        let handle = self.cache.get_or_create(&model, true).await;
        let result = self
            .runtime
            .generate(&handle, &prompt, &mut |token: &str| sink.send(token))
            .await;

        match result {
            Ok(()) => {
                self.persist_exchange(&request.question, sink.buffer()).await;
            }
            Err(e) => {
                tracing::error!(model = %model, error = %e, "Generation failed");
                self.recover(&model, e, &mut sink).await;
            }
        }

        sink.finish();
    }

    /// Write the user turn, then the raw assistant turn
    async fn persist_exchange(&self, question: &str, answer: &str) {
        if let Err(e) = self.store.append(Sender::User, question).await {
            tracing::warn!(error = %e, "Failed to buffer user turn");
            return;
        }
        if let Err(e) = self.store.append(Sender::Assistant, answer).await {
            tracing::warn!(error = %e, "Failed to buffer assistant turn");
        }

        if self.settings.mood_strategy == MoodStrategy::InlineTag {
            match extract_mood_tag(answer) {
                (_, Some(mood)) => {
                    if let Err(e) = self.store.log_mood(mood).await {
                        tracing::warn!(error = %e, "Failed to log mood from answer tag");
                    }
                }
                (_, None) => tracing::debug!("Answer carried no mood tag"),
            }
        }
    }

    async fn recover(&self, model: &str, error: InferenceError, sink: &mut TokenSink) {
        let installed = match self.runtime.list_models().await {
            Ok(models) => is_installed(&models, model),
            Err(e) => {
                tracing::warn!(error = %e, "Could not list local models");
                true
            }
        };

        if installed {
            sink.notice(&format!("Error: {}", error));
            return;
        }

        sink.notice(DOWNLOAD_NOTICE);
        sink.notice("\n");
        // outcome already relayed to the client
        let _ = acquisition::acquire(self.runtime.as_ref(), &self.cache, model, sink).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedRuntime;
    use crate::store::{Mood, StoreConfig};
    use crate::stream::DEFAULT_IDLE_TIMEOUT;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        runtime: Arc<ScriptedRuntime>,
        store: Arc<MemoryStore>,
        cache: Arc<ModelCache>,
        orchestrator: InferenceOrchestrator,
    }

    fn fixture(runtime: ScriptedRuntime, settings: SessionSettings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::open(StoreConfig::new(dir.path().join("m.db"))).unwrap());
        let runtime = Arc::new(runtime);
        let cache = Arc::new(ModelCache::default());
        let orchestrator = InferenceOrchestrator::new(
            runtime.clone(),
            store.clone(),
            cache.clone(),
            SessionSettings {
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
                ..settings
            },
        );

        Fixture {
            _dir: dir,
            runtime,
            store,
            cache,
            orchestrator,
        }
    }

    fn question(text: &str) -> QueryRequest {
        QueryRequest {
            question: text.to_string(),
            ..QueryRequest::default()
        }
    }

    async fn collect(stream: TokenStream) -> String {
        stream.into_stream().collect::<Vec<String>>().await.concat()
    }

    #[tokio::test]
    async fn test_streams_and_persists_exchange() {
        let fx = fixture(
            ScriptedRuntime::new().tokens(&["Hello", " there", "!"]),
            SessionSettings::default(),
        );

        let answer = collect(fx.orchestrator.run_query(question("Hi, how are you?"))).await;
        assert_eq!(answer, "Hello there!");

        let turns = fx.store.drain_unread().await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].sender, Sender::User);
        assert_eq!(turns[0].message, "Hi, how are you?");
        assert_eq!(turns[1].sender, Sender::Assistant);
        assert_eq!(turns[1].message, "Hello there!");
        assert_eq!(fx.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_language() {
        let fx = fixture(ScriptedRuntime::new().tokens(&["ok"]), SessionSettings::default());
        fx.store
            .add(MemoryKind::General, "I like biryani", None)
            .await
            .unwrap();

        let request = QueryRequest {
            question: "What food do I like?".to_string(),
            user_name: Some("Asha".to_string()),
            language: Some("fr".to_string()),
            ..QueryRequest::default()
        };
        collect(fx.orchestrator.run_query(request)).await;

        let prompt = &fx.runtime.prompts()[0];
        assert!(prompt.contains("User name: Asha"));
        assert!(prompt.contains("I like biryani"));
        assert!(prompt.contains("\"fr\""));
        assert!(prompt.contains("User message: What food do I like?"));
    }

    #[tokio::test]
    async fn test_missing_model_is_pulled() {
        let fx = fixture(
            ScriptedRuntime::new()
                .models(&["mistral:latest"])
                .pull_lines(&["pulling manifest: 100%", "verifying sha256 digest"]),
            SessionSettings::default(),
        );

        let request = QueryRequest {
            question: "I am sad today".to_string(),
            model: Some("m1".to_string()),
            ..QueryRequest::default()
        };
        let tokens: Vec<String> = fx
            .orchestrator
            .run_query(request)
            .into_stream()
            .collect()
            .await;

        assert_eq!(tokens[0], DOWNLOAD_NOTICE);
        assert!(tokens.contains(&"pulling manifest: 100%\n".to_string()));
        assert_eq!(tokens.last().map(String::as_str), Some("Download completed!"));

        assert_eq!(fx.runtime.pulls(), vec!["m1"]);
        assert!(fx.cache.is_empty().await);
        assert!(fx.store.drain_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_installed_model_error_is_relayed() {
        let fx = fixture(
            ScriptedRuntime::new()
                .generate_fails("out of memory")
                .models(&["gemma3n:e2b"]),
            SessionSettings::default(),
        );

        let answer = collect(fx.orchestrator.run_query(question("hello"))).await;

        assert_eq!(answer, "Error: Runtime error 404: out of memory");
        assert!(fx.runtime.pulls().is_empty());
        assert!(fx.store.drain_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_pull_still_terminates() {
        let fx = fixture(
            ScriptedRuntime::new().pull_fails(),
            SessionSettings::default(),
        );

        let answer = collect(fx.orchestrator.run_query(question("hello"))).await;

        assert!(answer.starts_with(DOWNLOAD_NOTICE));
        assert!(answer.ends_with("Download failed: Pull exited with status 1"));
    }

    #[tokio::test]
    async fn test_inline_tag_logs_mood() {
        let fx = fixture(
            ScriptedRuntime::new().tokens(&["Chin up, it gets better. ", "1Macin", "tosh"]),
            SessionSettings {
                mood_strategy: MoodStrategy::InlineTag,
                ..SessionSettings::default()
            },
        );

        collect(fx.orchestrator.run_query(question("I failed my exam"))).await;

        let moods = fx.store.moods().await.unwrap();
        assert_eq!(moods.len(), 1);
        assert_eq!(moods[0].mood, Mood::Sad);
        assert!(fx.runtime.prompts()[0].contains("Macintosh"));

        let turns = fx.store.drain_unread().await.unwrap();
        assert_eq!(turns[1].message, "Chin up, it gets better. 1Macintosh");
    }

    #[tokio::test]
    async fn test_unlistable_runtime_relays_error() {
        let fx = fixture(
            ScriptedRuntime::new().list_fails(),
            SessionSettings::default(),
        );

        let answer = collect(fx.orchestrator.run_query(question("hello"))).await;

        assert!(answer.starts_with("Error: "));
        assert!(fx.runtime.pulls().is_empty());
    }
}
