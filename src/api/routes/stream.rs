//! Chat Stream Route
//!
//! - POST /stream - Stream one assistant answer
//!
//! The body is raw UTF-8 chunks by default. Clients that accept
//! `text/event-stream` (or every client, when `api.stream_format = "sse"`)
//! get server-sent events closed by an `end` event.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::dto::StreamRequest;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::config::{MoodStrategy, StreamFormat};
use crate::stream::strip_mood_tags;

/// Data of the closing SSE event
pub const END_MARKER: &str = "[END]";

/// POST /stream
pub async fn stream_answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StreamRequest>,
) -> ApiResult<Response> {
    if request.question.trim().is_empty() {
        return Err(ApiError::Validation("question must not be empty".to_string()));
    }

    let as_sse = state.config.stream_format == StreamFormat::Sse || accepts_event_stream(&headers);
    tracing::debug!(model = ?request.model, sse = as_sse, "Stream requested");

    let mut tokens: BoxStream<'static, String> = state
        .orchestrator
        .run_query(request.into())
        .into_stream()
        .boxed();

    if state.orchestrator.settings().mood_strategy == MoodStrategy::InlineTag {
        tokens = strip_mood_tags(tokens).boxed();
    }

    if as_sse {
        let events = tokens
            // Event data may not carry carriage returns
            .map(|token| Ok::<_, Infallible>(Event::default().data(token.replace('\r', ""))))
            .chain(stream::once(async {
                Ok(Event::default().event("end").data(END_MARKER))
            }));
        return Ok(Sse::new(events).into_response());
    }

    let body = Body::from_stream(tokens.map(Ok::<_, Infallible>));
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_accept_header_selects_sse() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_event_stream(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
        assert!(accepts_event_stream(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!accepts_event_stream(&headers));
    }
}
