//! Background Classification Pipeline
//!
//! Drains the unread conversation buffer and turns it into moods, memories
//! and the rolling daily summary:
//!
//! ```text
//! drain_unread ─> user turns ─┬─ mood          ─> mood_log
//!                 (joined)    ├─ significance  ─> special / positive memory
//!                             └─ fact          ─> general memory
//!              ─> transcript ──  daily summary ─> daily_summaries
//!              ─> retire(all drained ids)
//! ```
//!
//! Turns are classified concurrently. A turn whose model or store call
//! fails is abandoned on its own; the batch carries on.

use chrono::Local;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, MoodStrategy};
use crate::llm::{prompt, InferenceError, ModelCache, ModelHandle, ModelRuntime};
use crate::store::{
    BufferLifecycle, BufferedTurn, MemoryKind, MemorySchema, MemoryStore, Sender, StoreError,
};

use super::parse::{
    parse_daily_summary, parse_fact, parse_mood, parse_significance, Significance,
};

/// Title used for positive memories stored in the special partition
pub const POSITIVE_TITLE: &str = "Memory";

/// Classification policy resolved from configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub classifier_model: String,
    pub schema: MemorySchema,
    pub positive_kind: MemoryKind,
    pub mood_strategy: MoodStrategy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            classifier_model: config.model.classifier_model().to_string(),
            schema: config.memory.schema,
            positive_kind: config.memory.positive_kind,
            mood_strategy: config.session.mood_strategy,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What one run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Buffer rows retired
    pub processed_count: usize,
    pub moods_logged: usize,
    pub memories_added: usize,
    pub summary_updated: bool,
}

/// Batch-level failures
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to drain conversation buffer: {0}")]
    Drain(#[source] StoreError),

    #[error("Failed to retire processed turns: {0}")]
    Retire(#[source] StoreError),
}

#[derive(Error, Debug)]
enum TurnError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes made for one turn, kept even when a later call fails
#[derive(Debug, Default)]
struct TurnOutcome {
    mood_logged: bool,
    memories_added: usize,
    error: Option<TurnError>,
}

pub struct ClassificationPipeline {
    runtime: Arc<dyn ModelRuntime>,
    store: Arc<MemoryStore>,
    cache: Arc<ModelCache>,
    settings: PipelineSettings,
}

impl ClassificationPipeline {
    pub fn new(
        runtime: Arc<dyn ModelRuntime>,
        store: Arc<MemoryStore>,
        cache: Arc<ModelCache>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            runtime,
            store,
            cache,
            settings,
        }
    }

    /// Classify everything unread, then retire it
    pub async fn process_buffer(&self) -> Result<ProcessReport, PipelineError> {
        let turns = self.store.drain_unread().await.map_err(PipelineError::Drain)?;
        if turns.is_empty() {
            tracing::debug!("Conversation buffer empty, nothing to process");
            return Ok(ProcessReport::default());
        }

        let handle = self
            .cache
            .get_or_create(&self.settings.classifier_model, false)
            .await;

        let messages = self.user_messages(&turns);
        tracing::info!(
            turns = turns.len(),
            classified = messages.len(),
            "Processing conversation buffer"
        );

        let outcomes = join_all(messages.iter().map(|m| self.classify_turn(&handle, m))).await;

        let mut report = ProcessReport::default();
        for outcome in outcomes {
            report.moods_logged += usize::from(outcome.mood_logged);
            report.memories_added += outcome.memories_added;
            if let Some(e) = outcome.error {
                tracing::warn!(error = %e, "Abandoned classification of a turn");
            }
        }

        report.summary_updated = self.update_summary(&handle, &turns).await;

        let ids: Vec<i64> = turns.iter().map(|t| t.id).collect();
        report.processed_count = self.store.retire(&ids).await.map_err(PipelineError::Retire)?;

        tracing::info!(
            processed = report.processed_count,
            moods = report.moods_logged,
            memories = report.memories_added,
            summary = report.summary_updated,
            "Conversation buffer processed"
        );
        Ok(report)
    }

    /// User messages to classify: one per turn, or one merged message
    fn user_messages(&self, turns: &[BufferedTurn]) -> Vec<String> {
        let user_turns = turns.iter().filter(|t| t.sender == Sender::User);

        match self.store.lifecycle() {
            BufferLifecycle::Delete => user_turns.map(|t| t.message.clone()).collect(),
            BufferLifecycle::Consolidate => {
                let merged = user_turns
                    .map(|t| t.message.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                if merged.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![merged]
                }
            }
        }
    }

    async fn classify_turn(&self, handle: &ModelHandle, message: &str) -> TurnOutcome {
        let mut outcome = TurnOutcome::default();
        if let Err(e) = self.classify_into(handle, message, &mut outcome).await {
            outcome.error = Some(e);
        }
        outcome
    }

    async fn classify_into(
        &self,
        handle: &ModelHandle,
        message: &str,
        outcome: &mut TurnOutcome,
    ) -> Result<(), TurnError> {
        if self.settings.mood_strategy == MoodStrategy::Classifier {
            let answer = self.runtime.complete(handle, &prompt::mood(message)).await?;
            match parse_mood(&answer) {
                Ok(mood) => {
                    self.store.log_mood(mood).await?;
                    outcome.mood_logged = true;
                }
                Err(e) => tracing::warn!(error = %e, "No mood logged for turn"),
            }
        }

        let answer = self
            .runtime
            .complete(handle, &prompt::significance(message))
            .await?;
        match parse_significance(&answer) {
            Ok(Significance::Special(title)) => {
                if self.store.add(MemoryKind::Special, message, Some(&title)).await? {
                    outcome.memories_added += 1;
                }
            }
            Ok(Significance::Positive) => {
                let (kind, title) = self.positive_target();
                if self.store.add(kind, message, title).await? {
                    outcome.memories_added += 1;
                }
            }
            Ok(Significance::Discard) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping significance check"),
        }

        if self.settings.schema == MemorySchema::Tiered {
            let answer = self.runtime.complete(handle, &prompt::fact(message)).await?;
            match parse_fact(&answer) {
                Ok(fact) if fact.is_storable() => {
                    if self.store.add(MemoryKind::General, &fact.value, None).await? {
                        outcome.memories_added += 1;
                    }
                }
                Ok(fact) => tracing::debug!(category = %fact.category, "Fact not stored"),
                Err(e) => tracing::warn!(error = %e, "Skipping fact extraction"),
            }
        }

        Ok(())
    }

    /// Partition and title for a plain "yes"
    fn positive_target(&self) -> (MemoryKind, Option<&'static str>) {
        let kind = if self.settings.schema.is_enabled(self.settings.positive_kind) {
            self.settings.positive_kind
        } else {
            MemoryKind::Special
        };

        match kind {
            MemoryKind::Special => (kind, Some(POSITIVE_TITLE)),
            _ => (kind, None),
        }
    }

    /// Regenerate today's summary; failures are logged and reported as `false`
    async fn update_summary(&self, handle: &ModelHandle, turns: &[BufferedTurn]) -> bool {
        let today = Local::now().date_naive();

        let previous = match self.store.get_summary(today).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load today's summary");
                None
            }
        };

        let transcript = turns
            .iter()
            .map(|t| format!("{}: {}", t.sender.label(), t.message))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompt::daily_summary(&transcript, previous.as_ref().map(|s| s.summary.as_str()));

        let answer = match self.runtime.complete(handle, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "Daily summary call failed");
                return false;
            }
        };

        let parts = match parse_daily_summary(&answer) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(error = %e, "Daily summary not understood");
                return false;
            }
        };

        match self.store.upsert_summary(today, &parts.summary, &parts.tips).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to store daily summary");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedRuntime;
    use crate::store::{Mood, StoreConfig};
    use tempfile::TempDir;

    const SUMMARY_ANSWER: &str =
        "### Summary\nA good day with a promotion.\n### Tips\n- Celebrate\n* Rest well\n1. Eat well";

    struct Fixture {
        _dir: TempDir,
        runtime: Arc<ScriptedRuntime>,
        store: Arc<MemoryStore>,
        pipeline: ClassificationPipeline,
    }

    fn fixture(
        runtime: ScriptedRuntime,
        lifecycle: BufferLifecycle,
        settings: PipelineSettings,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryStore::open(StoreConfig::new(dir.path().join("m.db")).lifecycle(lifecycle))
                .unwrap(),
        );
        let runtime = Arc::new(runtime);
        let pipeline = ClassificationPipeline::new(
            runtime.clone(),
            store.clone(),
            Arc::new(ModelCache::default()),
            settings,
        );

        Fixture {
            _dir: dir,
            runtime,
            store,
            pipeline,
        }
    }

    #[tokio::test]
    async fn test_empty_buffer_makes_no_calls() {
        let fx = fixture(
            ScriptedRuntime::new(),
            BufferLifecycle::Delete,
            PipelineSettings::default(),
        );

        let report = fx.pipeline.process_buffer().await.unwrap();

        assert_eq!(report, ProcessReport::default());
        assert!(fx.runtime.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_full_batch() {
        let runtime = ScriptedRuntime::new()
            .answer_when(&["Classify the mood", "promoted"], "mood: 0")
            .answer_when(&["Classify the mood", "biryani"], "maybe")
            .answer_when(&["Decide whether", "promoted"], "special: job promotion")
            .answer_when(&["Decide whether", "biryani"], "yes")
            .answer_when(&["Extract one fact", "promoted"], "validity: false\ntype: none\nvalue:")
            .answer_when(
                &["Extract one fact", "biryani"],
                "validity: true\ntype: food\nvalue: The user likes biryani",
            )
            .answer("Summarize today's", SUMMARY_ANSWER);
        let fx = fixture(runtime, BufferLifecycle::Delete, PipelineSettings::default());

        fx.store.append(Sender::User, "I got promoted today!").await.unwrap();
        fx.store.append(Sender::Assistant, "Congratulations!").await.unwrap();
        fx.store.append(Sender::User, "I like biryani").await.unwrap();

        let report = fx.pipeline.process_buffer().await.unwrap();

        assert_eq!(
            report,
            ProcessReport {
                processed_count: 3,
                moods_logged: 1,
                memories_added: 3,
                summary_updated: true,
            }
        );

        let moods = fx.store.moods().await.unwrap();
        assert_eq!(moods.len(), 1);
        assert_eq!(moods[0].mood, Mood::Happy);

        let special = fx.store.load(MemoryKind::Special).await.unwrap();
        assert_eq!(special[0].title.as_deref(), Some("Job Promotion"));
        assert_eq!(special[0].text, "I got promoted today!");

        let core = fx.store.load(MemoryKind::Core).await.unwrap();
        assert_eq!(core[0].text, "I like biryani");

        let general = fx.store.load(MemoryKind::General).await.unwrap();
        assert_eq!(general[0].text, "The user likes biryani");

        let summary = fx.store.get_summary(Local::now().date_naive()).await.unwrap().unwrap();
        assert_eq!(summary.summary, "A good day with a promotion.");
        assert_eq!(summary.tips, "Celebrate\nRest well\nEat well");

        // the transcript carries both senders
        let summary_prompt = fx
            .runtime
            .prompts()
            .into_iter()
            .find(|p| p.contains("Summarize today's"))
            .unwrap();
        assert!(summary_prompt.contains("Assistant: Congratulations!"));

        assert!(fx.store.drain_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consolidate_merges_user_turns() {
        let runtime = ScriptedRuntime::new()
            .answer("Classify the mood", "2")
            .answer("Decide whether", "no")
            .answer("Extract one fact", "validity: false\ntype: none\nvalue:")
            .answer("Summarize today's", SUMMARY_ANSWER);
        let fx = fixture(runtime, BufferLifecycle::Consolidate, PipelineSettings::default());

        fx.store.append(Sender::User, "I walked in the park").await.unwrap();
        fx.store.append(Sender::Assistant, "Lovely!").await.unwrap();
        fx.store.append(Sender::User, "I feel calm").await.unwrap();

        let report = fx.pipeline.process_buffer().await.unwrap();

        assert_eq!(report.processed_count, 3);
        assert_eq!(report.moods_logged, 1);
        assert_eq!(fx.runtime.calls_with("Classify the mood"), 1);
        assert!(fx.runtime.prompts()[0].contains("I walked in the park\nI feel calm"));

        // marked processed, so a second run finds nothing
        let again = fx.pipeline.process_buffer().await.unwrap();
        assert_eq!(again, ProcessReport::default());
    }

    #[tokio::test]
    async fn test_special_only_inline_tag() {
        let runtime = ScriptedRuntime::new()
            .answer("Decide whether", "yes")
            .answer("Summarize today's", SUMMARY_ANSWER);
        let settings = PipelineSettings {
            schema: MemorySchema::SpecialOnly,
            mood_strategy: MoodStrategy::InlineTag,
            ..PipelineSettings::default()
        };
        let fx = fixture(runtime, BufferLifecycle::Delete, settings);

        fx.store.append(Sender::User, "My sister visited").await.unwrap();

        let report = fx.pipeline.process_buffer().await.unwrap();

        assert_eq!(report.memories_added, 1);
        assert_eq!(report.moods_logged, 0);
        assert_eq!(fx.runtime.calls_with("Classify the mood"), 0);
        assert_eq!(fx.runtime.calls_with("Extract one fact"), 0);

        let special = fx.store.load(MemoryKind::Special).await.unwrap();
        assert_eq!(special[0].title.as_deref(), Some(POSITIVE_TITLE));
        assert!(fx.store.load(MemoryKind::Core).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_turn_does_not_abort_batch() {
        let runtime = ScriptedRuntime::new()
            .answer("Classify the mood", "1")
            .answer_when(&["Decide whether", "exam"], "no")
            .answer("Extract one fact", "validity: false\ntype: none\nvalue:");
        let fx = fixture(runtime, BufferLifecycle::Delete, PipelineSettings::default());

        fx.store.append(Sender::User, "I failed my exam").await.unwrap();
        fx.store.append(Sender::User, "Nobody called me").await.unwrap();

        let report = fx.pipeline.process_buffer().await.unwrap();

        // second turn has no significance answer, summary has none either
        assert_eq!(report.moods_logged, 2);
        assert_eq!(report.memories_added, 0);
        assert!(!report.summary_updated);
        assert_eq!(report.processed_count, 2);
        assert!(fx.store.drain_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mood_counted_when_later_call_fails() {
        let runtime = ScriptedRuntime::new().answer("Classify the mood", "0");
        let fx = fixture(runtime, BufferLifecycle::Delete, PipelineSettings::default());

        fx.store.append(Sender::User, "Sunny walk with my dog").await.unwrap();

        let report = fx.pipeline.process_buffer().await.unwrap();

        assert_eq!(report.moods_logged, 1);
        assert_eq!(fx.store.moods().await.unwrap().len(), 1);
        assert_eq!(fx.runtime.calls_with("Extract one fact"), 0);
        assert_eq!(report.processed_count, 1);
    }

    #[tokio::test]
    async fn test_previous_summary_is_fed_back() {
        let runtime = ScriptedRuntime::new()
            .answer("Classify the mood", "2")
            .answer("Decide whether", "no")
            .answer("Extract one fact", "validity: false\ntype: none\nvalue:")
            .answer("Summarize today's", SUMMARY_ANSWER);
        let fx = fixture(runtime, BufferLifecycle::Delete, PipelineSettings::default());

        let today = Local::now().date_naive();
        fx.store
            .upsert_summary(today, "Morning was calm.", "Breathe")
            .await
            .unwrap();
        fx.store.append(Sender::User, "Evening run done").await.unwrap();

        fx.pipeline.process_buffer().await.unwrap();

        assert_eq!(fx.runtime.calls_with("Morning was calm."), 1);
        let summary = fx.store.get_summary(today).await.unwrap().unwrap();
        assert_eq!(summary.summary, "A good day with a promotion.");
    }
}
