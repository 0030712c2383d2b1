//! Memory Routes
//!
//! - GET /special_memory - List special memories
//! - PUT /special_memory - Edit title and/or text
//! - DELETE /special_memory - Delete by id
//! - GET /memory - List memories of one kind (or all)
//! - PUT /memory - Edit a memory in any table
//! - DELETE /memory - Delete a memory from any table

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    IdRequest, MemoryDeleteRequest, MemoryQuery, MemoryUpdateRequest, MessageResponse,
    SpecialMemoryUpdate,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::{MemoryKind, MemoryRecord, MemoryUpdate};

/// GET /special_memory
pub async fn list_special(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MemoryRecord>>> {
    Ok(Json(state.store.load(MemoryKind::Special).await?))
}

/// PUT /special_memory
pub async fn update_special(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpecialMemoryUpdate>,
) -> ApiResult<Json<MessageResponse>> {
    let update = MemoryUpdate {
        title: request.title,
        text: request.memory,
    };
    apply_update(&state, MemoryKind::Special, request.id, update).await
}

/// DELETE /special_memory
pub async fn delete_special(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IdRequest>,
) -> ApiResult<Json<MessageResponse>> {
    apply_delete(&state, MemoryKind::Special, request.id).await
}

/// GET /memory
///
/// `?kind=` (or `?table=`) narrows to one partition; without either every
/// kind is listed, core first.
pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MemoryQuery>,
) -> ApiResult<Json<Vec<MemoryRecord>>> {
    let kinds = match query.kind.as_deref().or(query.table.as_deref()) {
        Some(name) => vec![parse_kind(name)?],
        None => MemoryKind::ALL.to_vec(),
    };

    let mut records = Vec::new();
    for kind in kinds {
        records.extend(state.store.load(kind).await?);
    }
    Ok(Json(records))
}

/// PUT /memory
pub async fn update_memory(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MemoryUpdateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let kind = parse_kind(&request.table)?;
    let update = MemoryUpdate {
        title: request.title,
        text: request.memory,
    };
    apply_update(&state, kind, request.id, update).await
}

/// DELETE /memory
pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MemoryDeleteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let kind = parse_kind(&request.table)?;
    apply_delete(&state, kind, request.id).await
}

fn parse_kind(name: &str) -> ApiResult<MemoryKind> {
    name.parse::<MemoryKind>().map_err(ApiError::Validation)
}

async fn apply_update(
    state: &AppState,
    kind: MemoryKind,
    id: i64,
    update: MemoryUpdate,
) -> ApiResult<Json<MessageResponse>> {
    if !update.changes(kind) {
        let message = if kind != MemoryKind::Special && update.title.is_some() {
            format!("{} memories have no title; memory is required", kind)
        } else {
            "title or memory is required".to_string()
        };
        return Err(ApiError::Validation(message));
    }

    if !state.store.update(kind, id, update).await? {
        return Err(ApiError::NotFound(format!("{} memory {}", kind, id)));
    }

    tracing::info!(kind = %kind, id, "Memory updated");
    Ok(Json(MessageResponse::new("Memory updated")))
}

async fn apply_delete(state: &AppState, kind: MemoryKind, id: i64) -> ApiResult<Json<MessageResponse>> {
    if !state.store.delete(kind, id).await? {
        return Err(ApiError::NotFound(format!("{} memory {}", kind, id)));
    }

    tracing::info!(kind = %kind, id, "Memory deleted");
    Ok(Json(MessageResponse::new("Memory deleted")))
}
