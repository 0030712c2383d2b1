//! Token streaming
//!
//! - **session**: the per-request producer/consumer bridge
//! - **tag**: stripping in-band mood markers from model output

pub mod session;
pub mod tag;

pub use session::{
    session, SessionState, StreamEvent, TokenSink, TokenStream, DEFAULT_IDLE_TIMEOUT,
};
pub use tag::{extract_mood_tag, strip_mood_tags, MoodTagFilter, TAG_WORD};
