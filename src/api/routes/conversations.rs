//! Conversation Processing Routes
//!
//! - POST /process_conversations - Classify the unread conversation buffer

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::api::dto::ProcessResponse;
use crate::api::state::AppState;

/// POST /process_conversations
///
/// Failures answer 500 with a flat `{error}` body, which is what the UI reads.
pub async fn process_conversations(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.process_buffer().await {
        Ok(report) => {
            tracing::info!(
                processed = report.processed_count,
                moods = report.moods_logged,
                memories = report.memories_added,
                summary = report.summary_updated,
                "Conversation buffer processed"
            );
            Json(ProcessResponse {
                message: format!("Processed {} conversation turns", report.processed_count),
                processed: report.processed_count,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Conversation processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
