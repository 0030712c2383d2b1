//! Model handle cache
//!
//! Handles are keyed by `(model, streaming)` and shared between requests.
//! The cache lives in `AppState`; acquisition and shutdown clear it so the
//! next request re-resolves the model.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Generation options sent with every request for a handle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOptions {
    pub temperature: Option<f32>,
}

/// A resolved model binding
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHandle {
    pub model: String,
    pub streaming: bool,
    pub options: ModelOptions,
}

/// Process-scoped cache of model handles
#[derive(Debug, Default)]
pub struct ModelCache {
    handles: Mutex<HashMap<(String, bool), Arc<ModelHandle>>>,
    options: ModelOptions,
}

impl ModelCache {
    pub fn new(options: ModelOptions) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Return the cached handle, creating it under the lock if missing
    pub async fn get_or_create(&self, model: &str, streaming: bool) -> Arc<ModelHandle> {
        let mut handles = self.handles.lock().await;
        handles
            .entry((model.to_string(), streaming))
            .or_insert_with(|| {
                tracing::debug!(model = %model, streaming, "Creating model handle");
                Arc::new(ModelHandle {
                    model: model.to_string(),
                    streaming,
                    options: self.options.clone(),
                })
            })
            .clone()
    }

    /// Drop every handle, returning how many were cached
    pub async fn clear(&self) -> usize {
        let mut handles = self.handles.lock().await;
        let count = handles.len();
        handles.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_are_shared_per_key() {
        let cache = ModelCache::new(ModelOptions {
            temperature: Some(0.7),
        });

        let a = cache.get_or_create("gemma3n:e2b", true).await;
        let b = cache.get_or_create("gemma3n:e2b", true).await;
        let c = cache.get_or_create("gemma3n:e2b", false).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.options.temperature, Some(0.7));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ModelCache::default();
        let before = cache.get_or_create("mistral", true).await;

        assert_eq!(cache.clear().await, 1);
        assert!(cache.is_empty().await);

        let after = cache.get_or_create("mistral", true).await;
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
