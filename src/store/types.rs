//! Core data types for the memory store
//!
//! - `MemoryRecord`: a remembered fact, partitioned by `MemoryKind`
//! - `BufferedTurn`: one conversation message waiting for classification
//! - `DailySummary`: the rolling summary for one calendar day
//! - `MoodEntry` and `Mood`: the mood log
//! - `MemorySchema` and `BufferLifecycle`: deployment policies resolved at startup

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Memory partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Persistent important facts about the user
    Core,
    /// Miscellaneous facts
    General,
    /// Titled positive memories, editable from the UI
    Special,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [MemoryKind::Core, MemoryKind::General, MemoryKind::Special];

    /// SQLite table backing this kind
    pub fn table(&self) -> &'static str {
        match self {
            MemoryKind::Core => "core_memories",
            MemoryKind::General => "general_memories",
            MemoryKind::Special => "special_memories",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Core => "core",
            MemoryKind::General => "general",
            MemoryKind::Special => "special",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    /// Accepts a bare kind ("core") or its table name ("core_memories")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "core" | "core_memories" => Ok(MemoryKind::Core),
            "general" | "general_memories" => Ok(MemoryKind::General),
            "special" | "special_memories" => Ok(MemoryKind::Special),
            other => Err(format!("Unknown memory kind: {}", other)),
        }
    }
}

/// A remembered fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub kind: MemoryKind,
    /// Only set for special memories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Serialized as `memory`, the field name the UI reads
    #[serde(rename = "memory")]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a memory row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryUpdate {
    pub title: Option<String>,
    pub text: Option<String>,
}

impl MemoryUpdate {
    /// Replacement text, if any non-blank text was given
    pub fn new_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Replacement title; only special memories carry one
    pub fn new_title(&self, kind: MemoryKind) -> Option<&str> {
        if kind != MemoryKind::Special {
            return None;
        }
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Whether applying this to a memory of `kind` would change anything
    pub fn changes(&self, kind: MemoryKind) -> bool {
        self.new_text().is_some() || self.new_title(kind).is_some()
    }
}

/// Author of a buffered turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    /// Prefix used when rendering a transcript
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Assistant",
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            other => Err(format!("Unknown sender: {}", other)),
        }
    }
}

/// Processing state of a buffered turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Unread,
    Processed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Unread => "unread",
            TurnStatus::Processed => "processed",
        }
    }
}

impl FromStr for TurnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(TurnStatus::Unread),
            "processed" => Ok(TurnStatus::Processed),
            other => Err(format!("Unknown turn status: {}", other)),
        }
    }
}

/// One message of a conversation, queued for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedTurn {
    pub id: i64,
    pub sender: Sender,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub status: TurnStatus,
}

/// Rolling summary for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub summary: String,
    pub tips: String,
}

/// Mood classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Mood {
    Happy = 0,
    Sad = 1,
    Neutral = 2,
}

impl Mood {
    pub fn from_code(code: u8) -> Option<Mood> {
        match code {
            0 => Some(Mood::Happy),
            1 => Some(Mood::Sad),
            2 => Some(Mood::Neutral),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl From<Mood> for u8 {
    fn from(mood: Mood) -> u8 {
        mood.code()
    }
}

impl TryFrom<u8> for Mood {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Mood::from_code(code).ok_or_else(|| format!("Mood must be 0, 1 or 2, got {}", code))
    }
}

/// One mood log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: i64,
    pub mood: Mood,
    pub timestamp: DateTime<Utc>,
}

/// Which memory partitions a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySchema {
    /// core, general and special memories
    #[default]
    Tiered,
    /// Only titled special memories
    SpecialOnly,
}

impl MemorySchema {
    pub fn enabled_kinds(&self) -> &'static [MemoryKind] {
        match self {
            MemorySchema::Tiered => &MemoryKind::ALL,
            MemorySchema::SpecialOnly => &[MemoryKind::Special],
        }
    }

    pub fn is_enabled(&self, kind: MemoryKind) -> bool {
        self.enabled_kinds().contains(&kind)
    }
}

/// How processed turns leave the conversation buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferLifecycle {
    /// Processed rows are deleted
    #[default]
    Delete,
    /// User turns are merged per batch and rows are marked processed
    Consolidate,
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub core_memories: usize,
    pub general_memories: usize,
    pub special_memories: usize,
    pub unread_turns: usize,
    pub daily_summaries: usize,
    pub mood_entries: usize,
}
