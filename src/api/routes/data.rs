//! Data Management Routes
//!
//! - DELETE /clear_data - Remove the database, optionally recreating it

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ClearParams, MessageResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// DELETE /clear_data
pub async fn clear_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClearParams>,
) -> ApiResult<Json<MessageResponse>> {
    state.store.clear(params.reinitialize).await?;

    tracing::warn!(reinitialize = params.reinitialize, "All data cleared");

    let message = if params.reinitialize {
        "All data cleared and database reinitialized"
    } else {
        "All data cleared"
    };
    Ok(Json(MessageResponse::new(message)))
}
