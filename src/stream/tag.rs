//! In-band mood tags
//!
//! With the `inline_tag` mood strategy the model ends its answer with a
//! marker such as `1Macintosh` (digit = mood code). The marker must never
//! reach the screen, but it can arrive split over several tokens, so the
//! filter holds back the shortest tail that could still grow into one.

use futures_util::stream::{self, Stream, StreamExt};

use crate::store::Mood;

/// Word glued to the mood digit
pub const TAG_WORD: &str = "Macintosh";

/// Incremental marker stripper
#[derive(Debug, Default)]
pub struct MoodTagFilter {
    pending: String,
    mood: Option<Mood>,
}

impl MoodTagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a token, returning the text that is safe to display now
    pub fn push(&mut self, token: &str) -> String {
        self.pending.push_str(token);
        self.strip_complete_tags();

        let hold = held_tail_start(&self.pending);
        self.pending.drain(..hold).collect()
    }

    /// Mood recovered so far (the last marker wins)
    pub fn mood(&self) -> Option<Mood> {
        self.mood
    }

    /// Flush whatever was held back
    pub fn finish(mut self) -> (String, Option<Mood>) {
        self.strip_complete_tags();
        (self.pending, self.mood)
    }

    fn strip_complete_tags(&mut self) {
        while let Some((start, mood)) = find_tag(&self.pending) {
            self.pending.replace_range(start..start + 1 + TAG_WORD.len(), "");
            self.mood = Some(mood);
        }
    }
}

/// Strip markers from a complete response and recover the mood code
pub fn extract_mood_tag(raw: &str) -> (String, Option<Mood>) {
    let mut filter = MoodTagFilter::new();
    let mut text = filter.push(raw);
    let (rest, mood) = filter.finish();
    text.push_str(&rest);
    (text, mood)
}

/// Apply a [`MoodTagFilter`] to a token stream
pub fn strip_mood_tags<S>(tokens: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = String> + Send + 'static,
{
    let state = (Box::pin(tokens), Some(MoodTagFilter::new()));

    stream::unfold(state, |(mut tokens, mut filter)| async move {
        loop {
            let active = filter.as_mut()?;
            match tokens.next().await {
                Some(token) => {
                    let visible = active.push(&token);
                    if !visible.is_empty() {
                        return Some((visible, (tokens, filter)));
                    }
                }
                None => {
                    let (rest, _) = filter.take()?.finish();
                    if rest.is_empty() {
                        return None;
                    }
                    return Some((rest, (tokens, None)));
                }
            }
        }
    })
}

/// Byte offset and mood of the first complete marker
fn find_tag(text: &str) -> Option<(usize, Mood)> {
    text.match_indices(TAG_WORD).find_map(|(i, _)| {
        let digit = *text.as_bytes().get(i.checked_sub(1)?)?;
        let mood = Mood::from_code(digit.checked_sub(b'0')?)?;
        Some((i - 1, mood))
    })
}

/// Start of the longest suffix that is a digit followed by a prefix of the tag word
fn held_tail_start(text: &str) -> usize {
    let window = text.len().saturating_sub(TAG_WORD.len());
    text.char_indices()
        .filter(|(i, _)| *i >= window)
        .find(|(i, c)| matches!(c, '0'..='2') && TAG_WORD.starts_with(&text[i + 1..]))
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_complete_tag() {
        let (text, mood) = extract_mood_tag("Cheer up, tomorrow is new! 1Macintosh");
        assert_eq!(text, "Cheer up, tomorrow is new! ");
        assert_eq!(mood, Some(Mood::Sad));
    }

    #[test]
    fn test_untagged_text_passes_through() {
        let (text, mood) = extract_mood_tag("I have 2 apples and a Macintosh");
        assert_eq!(text, "I have 2 apples and a Macintosh");
        assert_eq!(mood, None);
    }

    #[test]
    fn test_split_tag_is_held_back() {
        let mut filter = MoodTagFilter::new();

        assert_eq!(filter.push("Great news"), "Great news");
        assert_eq!(filter.push("! 0"), "! ");
        assert_eq!(filter.push("Mac"), "");
        assert_eq!(filter.push("intosh"), "");
        assert_eq!(filter.mood(), Some(Mood::Happy));

        let (rest, mood) = filter.finish();
        assert_eq!(rest, "");
        assert_eq!(mood, Some(Mood::Happy));
    }

    #[test]
    fn test_false_start_is_released() {
        let mut filter = MoodTagFilter::new();

        assert_eq!(filter.push("room 2"), "room ");
        assert_eq!(filter.push("M"), "");
        assert_eq!(filter.push("ax"), "2Max");

        let (rest, mood) = filter.finish();
        assert_eq!(rest, "");
        assert_eq!(mood, None);
    }

    #[test]
    fn test_trailing_digit_flushed_on_finish() {
        let mut filter = MoodTagFilter::new();
        assert_eq!(filter.push("Count to 1"), "Count to ");
        assert_eq!(filter.finish(), ("1".to_string(), None));
    }

    #[tokio::test]
    async fn test_strip_stream() {
        let tokens = stream::iter(
            ["Stay ", "strong", " 1", "Macin", "tosh"]
                .into_iter()
                .map(String::from),
        );

        let visible: Vec<String> = strip_mood_tags(tokens).collect().await;
        assert_eq!(visible.concat(), "Stay strong ");
    }
}
