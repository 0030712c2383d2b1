//! Memory Store - SQLite persistence for memories, turns, summaries and moods
//!
//! A fresh connection is opened for every operation and the blocking SQLite
//! work runs on tokio's blocking pool, so no connection or transaction is
//! ever shared between requests.
//!
//! # Tables
//!
//! ```text
//! core_memories       (id, memory UNIQUE, created_at)
//! general_memories    (id, memory UNIQUE, created_at)
//! special_memories    (id, title, memory UNIQUE, created_at)
//! conversation_buffer (id, sender, message, created_at, status)
//! daily_summaries     (id, date UNIQUE, summary, tips, updated_at)
//! mood_log            (id, mood, timestamp)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::relevance;
use super::types::{
    BufferLifecycle, BufferedTurn, DailySummary, MemoryKind, MemoryRecord, MemoryUpdate, Mood,
    MoodEntry, Sender, StoreStats, TurnStatus,
};

/// Title given to special memories stored without one
pub const DEFAULT_TITLE: &str = "Untitled";

const TABLES: [&str; 6] = [
    "core_memories",
    "general_memories",
    "special_memories",
    "conversation_buffer",
    "daily_summaries",
    "mood_log",
];

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS core_memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        memory TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS general_memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        memory TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS special_memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        memory TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS conversation_buffer (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender TEXT NOT NULL CHECK (sender IN ('user', 'assistant')),
        message TEXT NOT NULL,
        created_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'unread'
    );

    CREATE INDEX IF NOT EXISTS idx_buffer_status ON conversation_buffer(status);

    CREATE TABLE IF NOT EXISTS daily_summaries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL UNIQUE,
        summary TEXT NOT NULL,
        tips TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS mood_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        mood INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    );
";

/// Configuration for the memory store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the SQLite database file
    pub path: PathBuf,
    /// What happens to turns once classified
    pub lifecycle: BufferLifecycle,
    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    /// Create config for a database file with default policies
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lifecycle: BufferLifecycle::default(),
            busy_timeout_ms: 5_000,
        }
    }

    /// Builder method: set the buffer lifecycle
    pub fn lifecycle(mut self, lifecycle: BufferLifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }
}

/// Persistent store owning every memory, turn, summary and mood row
pub struct MemoryStore {
    config: StoreConfig,
}

impl MemoryStore {
    /// Open (creating if needed) the database and its schema
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = connect(&config.path, config.busy_timeout_ms)?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = ?config.path, lifecycle = ?config.lifecycle, "Memory store ready");

        Ok(Self { config })
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Buffer lifecycle in effect
    pub fn lifecycle(&self) -> BufferLifecycle {
        self.config.lifecycle
    }

    /// Run `f` against a fresh connection on the blocking pool
    async fn run<T, F>(&self, op: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.config.path.clone();
        let busy_timeout_ms = self.config.busy_timeout_ms;

        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&path, busy_timeout_ms)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("{}: {}", op, e)))?
    }

    // ==================== Memories ====================

    /// Insert a memory unless the same text already exists for `kind`.
    ///
    /// Returns whether a new row was created.
    pub async fn add(&self, kind: MemoryKind, text: &str, title: Option<&str>) -> StoreResult<bool> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Ok(false);
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = self
            .run("add", move |conn| {
                let changed = match kind {
                    MemoryKind::Special => conn.execute(
                        "INSERT OR IGNORE INTO special_memories (title, memory, created_at)
                         VALUES (?1, ?2, ?3)",
                        params![title, text, now],
                    )?,
                    _ => conn.execute(
                        &format!(
                            "INSERT OR IGNORE INTO {} (memory, created_at) VALUES (?1, ?2)",
                            kind.table()
                        ),
                        params![text, now],
                    )?,
                };
                Ok(changed == 1)
            })
            .await?;

        tracing::debug!(kind = %kind, inserted, "Memory insert");
        Ok(inserted)
    }

    /// All memories of a kind, newest first
    pub async fn load(&self, kind: MemoryKind) -> StoreResult<Vec<MemoryRecord>> {
        self.run("load", move |conn| select_memories(conn, kind))
            .await
    }

    /// Memories of a kind ranked by word overlap with `query`
    pub async fn relevant(
        &self,
        kind: MemoryKind,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<MemoryRecord>> {
        if relevance::tokenize(query).is_empty() {
            return Ok(Vec::new());
        }

        // SQLite's lower() and LIKE only fold ASCII, so candidates are matched in Rust
        let candidates = self
            .run("relevant", move |conn| select_memories(conn, kind))
            .await?;

        Ok(relevance::rank(query, candidates, limit))
    }

    /// Update the title and/or text of a memory.
    ///
    /// Titles only apply to special memories. Returns `false` if no row has `id`,
    /// and [`StoreError::Duplicate`] if another row already holds the new text.
    pub async fn update(&self, kind: MemoryKind, id: i64, update: MemoryUpdate) -> StoreResult<bool> {
        self.run("update", move |conn| {
            let tx = conn.transaction()?;

            if let Some(text) = update.new_text() {
                tx.execute(
                    &format!("UPDATE {} SET memory = ?1 WHERE id = ?2", kind.table()),
                    params![text, id],
                )
                .map_err(|e| duplicate_or(e, text))?;
            }

            if let Some(title) = update.new_title(kind) {
                tx.execute(
                    "UPDATE special_memories SET title = ?1 WHERE id = ?2",
                    params![title, id],
                )?;
            }

            let exists: bool = tx.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", kind.table()),
                params![id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(exists)
        })
        .await
    }

    /// Delete a memory. Returns `false` if no row has `id`.
    pub async fn delete(&self, kind: MemoryKind, id: i64) -> StoreResult<bool> {
        self.run("delete", move |conn| {
            let changed = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    // ==================== Conversation Buffer ====================

    /// Queue a turn for classification
    pub async fn append(&self, sender: Sender, message: &str) -> StoreResult<i64> {
        let message = message.to_string();
        let now = Utc::now().to_rfc3339();

        self.run("append", move |conn| {
            conn.execute(
                "INSERT INTO conversation_buffer (sender, message, created_at, status)
                 VALUES (?1, ?2, ?3, ?4)",
                params![sender.as_str(), message, now, TurnStatus::Unread.as_str()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// All unread turns, oldest first
    pub async fn drain_unread(&self) -> StoreResult<Vec<BufferedTurn>> {
        self.run("drain_unread", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender, message, created_at, status FROM conversation_buffer
                 WHERE status = ?1
                 ORDER BY id ASC",
            )?;

            let rows = stmt.query_map(params![TurnStatus::Unread.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?;

            let mut turns = Vec::new();
            for row in rows {
                let (id, sender, message, created_at, status) = row?;
                turns.push(BufferedTurn {
                    id,
                    sender: sender.parse().map_err(StoreError::Corruption)?,
                    message,
                    created_at: parse_timestamp(&created_at)?,
                    status: status.parse().map_err(StoreError::Corruption)?,
                });
            }
            Ok(turns)
        })
        .await
    }

    /// Retire processed turns according to the configured lifecycle.
    ///
    /// Idempotent: retiring an already retired id changes nothing.
    pub async fn retire(&self, ids: &[i64]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids = ids.to_vec();
        let lifecycle = self.config.lifecycle;

        self.run("retire", move |conn| {
            let tx = conn.transaction()?;
            let mut retired = 0;
            {
                let mut stmt = match lifecycle {
                    BufferLifecycle::Delete => {
                        tx.prepare("DELETE FROM conversation_buffer WHERE id = ?1")?
                    }
                    BufferLifecycle::Consolidate => tx.prepare(
                        "UPDATE conversation_buffer SET status = 'processed'
                         WHERE id = ?1 AND status = 'unread'",
                    )?,
                };
                for id in &ids {
                    retired += stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            Ok(retired)
        })
        .await
    }

    // ==================== Daily Summaries ====================

    /// Insert or overwrite the summary for `date`
    pub async fn upsert_summary(&self, date: NaiveDate, summary: &str, tips: &str) -> StoreResult<()> {
        let summary = summary.to_string();
        let tips = tips.to_string();
        let now = Utc::now().to_rfc3339();

        self.run("upsert_summary", move |conn| {
            conn.execute(
                "INSERT INTO daily_summaries (date, summary, tips, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(date) DO UPDATE SET
                    summary = excluded.summary,
                    tips = excluded.tips,
                    updated_at = excluded.updated_at",
                params![date.format("%Y-%m-%d").to_string(), summary, tips, now],
            )?;
            Ok(())
        })
        .await
    }

    /// Summary for `date`, if one was generated
    pub async fn get_summary(&self, date: NaiveDate) -> StoreResult<Option<DailySummary>> {
        self.run("get_summary", move |conn| {
            let row = conn
                .query_row(
                    "SELECT summary, tips FROM daily_summaries WHERE date = ?1",
                    params![date.format("%Y-%m-%d").to_string()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            Ok(row.map(|(summary, tips)| DailySummary { date, summary, tips }))
        })
        .await
    }

    // ==================== Mood Log ====================

    /// Append a mood entry stamped with the current time
    pub async fn log_mood(&self, mood: Mood) -> StoreResult<MoodEntry> {
        let timestamp = Utc::now();

        let id = self
            .run("log_mood", move |conn| {
                conn.execute(
                    "INSERT INTO mood_log (mood, timestamp) VALUES (?1, ?2)",
                    params![mood.code(), timestamp.to_rfc3339()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::debug!(mood = mood.code(), "Mood logged");
        Ok(MoodEntry { id, mood, timestamp })
    }

    /// All mood entries, oldest first
    pub async fn moods(&self) -> StoreResult<Vec<MoodEntry>> {
        self.run("moods", |conn| {
            let mut stmt = conn.prepare("SELECT id, mood, timestamp FROM mood_log ORDER BY id ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, code, timestamp) = row?;
                let mood = Mood::from_code(code)
                    .ok_or_else(|| StoreError::Corruption(format!("invalid mood code {}", code)))?;
                entries.push(MoodEntry {
                    id,
                    mood,
                    timestamp: parse_timestamp(&timestamp)?,
                });
            }
            Ok(entries)
        })
        .await
    }

    /// Remove every mood entry, returning how many were deleted
    pub async fn clear_moods(&self) -> StoreResult<usize> {
        self.run("clear_moods", |conn| Ok(conn.execute("DELETE FROM mood_log", [])?))
            .await
    }

    // ==================== Maintenance ====================

    /// Row counts per table
    pub async fn stats(&self) -> StoreResult<StoreStats> {
        self.run("stats", |conn| {
            let count = |sql: &str| -> StoreResult<usize> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as usize)
            };

            Ok(StoreStats {
                core_memories: count("SELECT COUNT(*) FROM core_memories")?,
                general_memories: count("SELECT COUNT(*) FROM general_memories")?,
                special_memories: count("SELECT COUNT(*) FROM special_memories")?,
                unread_turns: count(
                    "SELECT COUNT(*) FROM conversation_buffer WHERE status = 'unread'",
                )?,
                daily_summaries: count("SELECT COUNT(*) FROM daily_summaries")?,
                mood_entries: count("SELECT COUNT(*) FROM mood_log")?,
            })
        })
        .await
    }

    /// Dump every table into one CSV payload.
    ///
    /// Each table is a section: a record holding the table name, a header
    /// record, then the data rows.
    pub async fn export_csv(&self) -> StoreResult<String> {
        self.run("export_csv", |conn| {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(Vec::new());

            for table in TABLES {
                writer.write_record([table])?;

                let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY id ASC", table))?;
                let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
                writer.write_record(&columns)?;

                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let mut record = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        record.push(value_to_string(row.get_ref(i)?));
                    }
                    writer.write_record(&record)?;
                }
            }

            let bytes = writer
                .into_inner()
                .map_err(|e| StoreError::Export(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| StoreError::Export(e.to_string()))
        })
        .await
    }

    /// Delete the database file and, if asked, recreate an empty schema
    pub async fn clear(&self, reinitialize: bool) -> StoreResult<()> {
        let path = self.config.path.clone();
        let busy_timeout_ms = self.config.busy_timeout_ms;

        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            for suffix in ["", "-wal", "-shm"] {
                let file = PathBuf::from(format!("{}{}", path.display(), suffix));
                match std::fs::remove_file(&file) {
                    Ok(()) => tracing::info!(file = ?file, "Removed database file"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }

            if reinitialize {
                let conn = connect(&path, busy_timeout_ms)?;
                conn.execute_batch(SCHEMA)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(format!("clear: {}", e)))?
    }
}

/// Open a connection with the flags and timeout every operation uses
fn connect(path: &Path, busy_timeout_ms: u64) -> StoreResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    Ok(conn)
}

fn select_memories(conn: &Connection, kind: MemoryKind) -> StoreResult<Vec<MemoryRecord>> {
    let title_column = if kind == MemoryKind::Special { "title" } else { "NULL" };
    let sql = format!(
        "SELECT id, {}, memory, created_at FROM {} ORDER BY id DESC",
        title_column,
        kind.table()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, title, text, created_at) = row?;
        records.push(MemoryRecord {
            id,
            kind,
            title,
            text,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(records)
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corruption(format!("bad timestamp '{}': {}", s, e)))
}

fn duplicate_or(err: rusqlite::Error, text: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Duplicate(text.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
