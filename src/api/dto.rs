//! Data Transfer Objects
//!
//! Request and response types for the API endpoints. Field names follow
//! what the desktop UI sends and expects.

use serde::{Deserialize, Serialize};

use crate::inference::QueryRequest;
use crate::store::StoreStats;

// ============================================
// STREAM DTOs
// ============================================

/// Chat request body for `POST /stream`
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub question: String,
    #[serde(default, rename = "userName", alias = "user_name")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl From<StreamRequest> for QueryRequest {
    fn from(req: StreamRequest) -> Self {
        QueryRequest {
            question: req.question,
            user_name: req.user_name,
            context: req.context,
            model: req.model,
            language: req.language,
        }
    }
}

/// Response for `GET /models`
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub available_models: Vec<String>,
}

// ============================================
// PROCESSING DTOs
// ============================================

/// Response for `POST /process_conversations`
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub message: String,
    /// Conversation turns retired
    pub processed: usize,
}

// ============================================
// MOOD DTOs
// ============================================

/// Mood to log; the UI sends `graph`, other clients `mood`
#[derive(Debug, Deserialize)]
pub struct MoodRequest {
    #[serde(default)]
    pub graph: Option<i64>,
    #[serde(default)]
    pub mood: Option<i64>,
}

impl MoodRequest {
    pub fn code(&self) -> Option<i64> {
        self.graph.or(self.mood)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoodResponse {
    pub mood: u8,
}

// ============================================
// MEMORY DTOs
// ============================================

/// Filter for `GET /memory`
#[derive(Debug, Default, Deserialize)]
pub struct MemoryQuery {
    pub kind: Option<String>,
    /// Table name, accepted as an alias of `kind`
    pub table: Option<String>,
}

/// `PUT /special_memory`
#[derive(Debug, Deserialize)]
pub struct SpecialMemoryUpdate {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

/// `DELETE /special_memory`
#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: i64,
}

/// `PUT /memory`
#[derive(Debug, Deserialize)]
pub struct MemoryUpdateRequest {
    pub id: i64,
    pub table: String,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// `DELETE /memory`
#[derive(Debug, Deserialize)]
pub struct MemoryDeleteRequest {
    pub id: i64,
    pub table: String,
}

// ============================================
// DATA DTOs
// ============================================

/// Query for `DELETE /clear_data`
#[derive(Debug, Deserialize)]
pub struct ClearParams {
    #[serde(default = "default_reinitialize")]
    pub reinitialize: bool,
}

fn default_reinitialize() -> bool {
    true
}

/// Generic confirmation
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rows removed by a delete
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Response for `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "ok" or "error"
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StoreStats>,
    pub cached_models: usize,
    pub uptime_seconds: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_request_accepts_ui_field_names() {
        let req: StreamRequest =
            serde_json::from_str(r#"{"question": "hi", "userName": "Asha", "model": "m1"}"#).unwrap();
        assert_eq!(req.user_name.as_deref(), Some("Asha"));

        let req: StreamRequest = serde_json::from_str(r#"{"question": "hi", "user_name": "Ravi"}"#).unwrap();
        let query: QueryRequest = req.into();
        assert_eq!(query.user_name.as_deref(), Some("Ravi"));
        assert_eq!(query.model, None);
    }

    #[test]
    fn test_mood_request_prefers_graph() {
        let req: MoodRequest = serde_json::from_str(r#"{"graph": 1}"#).unwrap();
        assert_eq!(req.code(), Some(1));
        let req: MoodRequest = serde_json::from_str(r#"{"mood": 2}"#).unwrap();
        assert_eq!(req.code(), Some(2));
        let req: MoodRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.code(), None);
    }
}
