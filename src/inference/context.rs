//! Prompt context assembly

use crate::store::{MemoryKind, MemoryRecord, MemorySchema, MemoryStore};

/// Relevant memories per enabled kind, in priority order.
///
/// Store failures are logged and treated as "no memories".
pub async fn gather_memories(
    store: &MemoryStore,
    schema: MemorySchema,
    priority: &[MemoryKind],
    question: &str,
    limit: usize,
) -> Vec<(MemoryKind, Vec<MemoryRecord>)> {
    let mut gathered = Vec::new();

    for &kind in priority.iter().filter(|k| schema.is_enabled(**k)) {
        match store.relevant(kind, question, limit).await {
            Ok(records) if !records.is_empty() => gathered.push((kind, records)),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Failed to load relevant memories");
            }
        }
    }

    gathered
}

/// Render the conversation context handed to the chat prompt
pub fn build_context(
    user_name: Option<&str>,
    prior: Option<&str>,
    memories: &[(MemoryKind, Vec<MemoryRecord>)],
) -> String {
    let mut sections = Vec::new();

    if let Some(name) = user_name.map(str::trim).filter(|n| !n.is_empty()) {
        sections.push(format!("User name: {}", name));
    }

    if let Some(prior) = prior.map(str::trim).filter(|p| !p.is_empty()) {
        sections.push(prior.to_string());
    }

    for (kind, records) in memories {
        let mut section = format!("Things you remember about the user ({}):", kind);
        for record in records {
            section.push_str("\n- ");
            section.push_str(&record.text);
        }
        sections.push(section);
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use chrono::Utc;

    fn record(text: &str) -> MemoryRecord {
        MemoryRecord {
            id: 1,
            kind: MemoryKind::General,
            title: None,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_context_order() {
        let memories = vec![
            (MemoryKind::Special, vec![record("I graduated in May")]),
            (MemoryKind::General, vec![record("I like biryani"), record("I like pizza")]),
        ];

        let context = build_context(Some("Asha"), Some("User: hi\nAssistant: hello"), &memories);

        let name = context.find("User name: Asha").unwrap();
        let prior = context.find("User: hi").unwrap();
        let special = context.find("I graduated in May").unwrap();
        let general = context.find("- I like pizza").unwrap();
        assert!(name < prior && prior < special && special < general);
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(None, Some("  "), &[]), "");
    }

    #[tokio::test]
    async fn test_gather_respects_schema_and_priority() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(StoreConfig::new(dir.path().join("m.db"))).unwrap();

        store.add(MemoryKind::General, "I like biryani", None).await.unwrap();
        store.add(MemoryKind::Core, "I like long walks", None).await.unwrap();
        store
            .add(MemoryKind::Special, "I like my new job", Some("job"))
            .await
            .unwrap();

        let priority = [MemoryKind::Special, MemoryKind::Core, MemoryKind::General];

        let tiered = gather_memories(&store, MemorySchema::Tiered, &priority, "what do I like", 20).await;
        let kinds: Vec<MemoryKind> = tiered.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, priority.to_vec());

        let special_only =
            gather_memories(&store, MemorySchema::SpecialOnly, &priority, "what do I like", 20).await;
        assert_eq!(special_only.len(), 1);
        assert_eq!(special_only[0].0, MemoryKind::Special);
    }
}
