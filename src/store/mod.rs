//! GemmaTalk Memory Store
//!
//! Everything the assistant remembers lives in one SQLite file:
//!
//! - **types**: records, turns, summaries, moods and the deployment policies
//! - **relevance**: lexical overlap ranking used for context assembly
//! - **engine**: the `MemoryStore` itself
//! - **error**: error types
//!
//! # Example
//!
//! ```rust,no_run
//! use gemmatalk::store::{MemoryKind, MemoryStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::open(StoreConfig::new("./data/gemmatalk.db"))?;
//!
//!     store.add(MemoryKind::General, "I like biryani", None).await?;
//!     let hits = store.relevant(MemoryKind::General, "what food do I like", 20).await?;
//!
//!     println!("{} relevant memories", hits.len());
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod relevance;
pub mod types;

pub use engine::{MemoryStore, StoreConfig, DEFAULT_TITLE};
pub use error::{StoreError, StoreResult};
pub use types::{
    BufferLifecycle, BufferedTurn, DailySummary, MemoryKind, MemoryRecord, MemorySchema,
    MemoryUpdate, Mood, MoodEntry, Sender, StoreStats, TurnStatus,
};
