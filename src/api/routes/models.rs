//! Model Routes
//!
//! - GET /models - Models the UI can offer

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::ModelsResponse;
use crate::api::state::AppState;

/// GET /models
///
/// Installed models as reported by the runtime. Falls back to the configured
/// list when the runtime is unreachable or has nothing installed, so the UI
/// can still offer models to download.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let available_models = match state.runtime.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => state.config.known_models.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "Model listing failed, using configured list");
            state.config.known_models.clone()
        }
    };

    Json(ModelsResponse { available_models })
}
