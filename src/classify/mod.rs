//! Background classification of buffered conversation turns
//!
//! - **pipeline**: drains the buffer and writes moods, memories and summaries
//! - **parse**: parsers for the classifier answers

pub mod parse;
pub mod pipeline;

pub use parse::{
    parse_daily_summary, parse_fact, parse_mood, parse_significance, title_case,
    ClassificationParseError, Fact, Significance, SummaryParts,
};
pub use pipeline::{
    ClassificationPipeline, PipelineError, PipelineSettings, ProcessReport, POSITIVE_TITLE,
};
