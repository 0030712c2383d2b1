//! Export Routes
//!
//! - GET /export_data - Every table as one CSV attachment

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /export_data
pub async fn export_data(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let body = state.store.export_csv().await?;

    let filename = format!("gemmatalk_export_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    tracing::info!(bytes = body.len(), filename = %filename, "Data exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(body),
    )
        .into_response())
}
