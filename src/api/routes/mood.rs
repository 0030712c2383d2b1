//! Mood Routes
//!
//! - GET /mood - Full mood log, oldest first
//! - POST /mood - Append one entry
//! - DELETE /mood - Clear the log

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{DeletedResponse, MoodRequest, MoodResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::{Mood, MoodEntry};

/// GET /mood
pub async fn list_moods(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MoodEntry>>> {
    Ok(Json(state.store.moods().await?))
}

/// POST /mood
pub async fn log_mood(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MoodRequest>,
) -> ApiResult<(StatusCode, Json<MoodResponse>)> {
    let code = request
        .code()
        .ok_or_else(|| ApiError::Validation("graph or mood is required".to_string()))?;

    let mood = u8::try_from(code)
        .ok()
        .and_then(Mood::from_code)
        .ok_or_else(|| ApiError::Validation(format!("Mood must be 0, 1 or 2, got {}", code)))?;

    let entry = state.store.log_mood(mood).await?;
    tracing::info!(mood = entry.mood.code(), "Mood logged");

    Ok((
        StatusCode::CREATED,
        Json(MoodResponse {
            mood: entry.mood.code(),
        }),
    ))
}

/// DELETE /mood
pub async fn clear_moods(State(state): State<Arc<AppState>>) -> ApiResult<Json<DeletedResponse>> {
    let deleted = state.store.clear_moods().await?;
    Ok(Json(DeletedResponse { deleted }))
}
