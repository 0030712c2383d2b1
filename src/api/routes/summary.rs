//! Summary Routes
//!
//! - GET /mood_summary - Today's rolling summary and tips

use axum::{extract::State, Json};
use chrono::Local;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::store::DailySummary;

/// GET /mood_summary
///
/// A one-element array when a summary exists for today, otherwise empty.
pub async fn today_summary(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<DailySummary>>> {
    let today = Local::now().date_naive();
    let summary = state.store.get_summary(today).await?;
    Ok(Json(summary.into_iter().collect()))
}
