//! Lexical relevance scoring
//!
//! Memories are ranked by plain word overlap with the query:
//!
//! ```text
//! query  "I like food"      -> {i, like, food}
//! memory "I like biryani"   -> {i, like, biryani}   score 2
//! memory "I live in Pune"   -> {i, live, in, pune}  score 1
//! ```
//!
//! No stemming, no punctuation stripping, no embeddings.

use std::collections::HashSet;

use super::types::MemoryRecord;

/// Lower-cased, de-duplicated whitespace tokens in first-seen order
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Whether any query token occurs as a substring of `text` (case-insensitive)
pub fn is_candidate(query_tokens: &[String], text: &str) -> bool {
    let haystack = text.to_lowercase();
    query_tokens.iter().any(|token| haystack.contains(token.as_str()))
}

/// Size of the intersection between the query tokens and the words of `text`
pub fn overlap_score(query_tokens: &[String], text: &str) -> usize {
    let words: HashSet<String> = text.split_whitespace().map(str::to_lowercase).collect();
    query_tokens
        .iter()
        .filter(|token| words.contains(token.as_str()))
        .count()
}

/// Rank candidate records against a query.
///
/// Rows scoring zero are dropped. The sort is stable, so ties keep the
/// order of `records` (newest first when fed from the store).
pub fn rank(query: &str, records: Vec<MemoryRecord>, limit: usize) -> Vec<MemoryRecord> {
    let tokens = tokenize(query);
    if tokens.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, MemoryRecord)> = records
        .into_iter()
        .filter(|record| is_candidate(&tokens, &record.text))
        .map(|record| (overlap_score(&tokens, &record.text), record))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(limit);
    scored.into_iter().map(|(_, record)| record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::MemoryKind;
    use chrono::Utc;

    fn record(id: i64, text: &str) -> MemoryRecord {
        MemoryRecord {
            id,
            kind: MemoryKind::General,
            title: None,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tokenize_lowercases_and_dedups() {
        assert_eq!(tokenize("I  like I LIKE\tfood"), vec!["i", "like", "food"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_overlap_counts_whole_words_only() {
        let tokens = tokenize("I like food");
        assert_eq!(overlap_score(&tokens, "I like biryani"), 2);
        assert_eq!(overlap_score(&tokens, "I live in Pune"), 1);
        // "like" is only a substring of "likely"
        assert_eq!(overlap_score(&tokens, "likely rain"), 0);
        assert!(is_candidate(&tokens, "likely rain"));
    }

    #[test]
    fn test_rank_orders_by_overlap() {
        let records = vec![
            record(3, "I live in Pune"),
            record(2, "I like pizza"),
            record(1, "I like biryani"),
        ];

        let ranked = rank("I like food", records, 20);
        let ids: Vec<i64> = ranked.iter().map(|r| r.id).collect();

        // ties keep input order
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_rank_drops_zero_scores_and_truncates() {
        let records = vec![
            record(3, "likely rain tomorrow"),
            record(2, "I like pizza"),
            record(1, "I like biryani"),
        ];

        let ranked = rank("like", records, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, 2);
    }

    #[test]
    fn test_rank_empty_query() {
        let ranked = rank("  ", vec![record(1, "anything")], 20);
        assert!(ranked.is_empty());
    }
}
