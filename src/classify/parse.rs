//! Parsers for the classifier answers
//!
//! Small models are chatty, so every parser is lenient about case,
//! surrounding whitespace and stray punctuation, but strict about the shape
//! it needs.

use thiserror::Error;

use crate::store::{Mood, DEFAULT_TITLE};

/// A classifier answer did not have the expected shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationParseError {
    #[error("No mood digit in answer {0:?}")]
    NoMood(String),

    #[error("Mood code {0} is not 0, 1 or 2")]
    MoodOutOfRange(u8),

    #[error("Unrecognised significance answer {0:?}")]
    Significance(String),

    #[error("Fact answer is missing the `{0}` line")]
    MissingField(&'static str),

    #[error("Summary answer has no `### Tips` section")]
    MissingTips,
}

/// Mood code: the first ASCII digit of the answer
pub fn parse_mood(answer: &str) -> Result<Mood, ClassificationParseError> {
    let digit = answer
        .chars()
        .find(char::is_ascii_digit)
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| ClassificationParseError::NoMood(answer.trim().to_string()))?;

    let code = digit as u8;
    Mood::from_code(code).ok_or(ClassificationParseError::MoodOutOfRange(code))
}

/// Outcome of the "worth remembering" check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Significance {
    /// Titled special memory
    Special(String),
    /// Plain positive memory
    Positive,
    Discard,
}

pub fn parse_significance(answer: &str) -> Result<Significance, ClassificationParseError> {
    let line = answer
        .lines()
        .map(clean_line)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let lowered = line.to_lowercase();

    if lowered.starts_with("special") {
        if let Some((_, title)) = line.split_once(':') {
            let title = title
                .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '.' | '*'));
            let title = title_case(title);
            return Ok(Significance::Special(if title.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title
            }));
        }
    }

    match lowered.trim_end_matches(['.', '!']) {
        "yes" => Ok(Significance::Positive),
        "no" => Ok(Significance::Discard),
        _ => Err(ClassificationParseError::Significance(answer.trim().to_string())),
    }
}

/// A fact extracted from a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub valid: bool,
    pub category: String,
    pub value: String,
}

impl Fact {
    /// Valid, not a name, and not empty
    pub fn is_storable(&self) -> bool {
        self.valid && self.category != "name" && !self.value.is_empty()
    }
}

pub fn parse_fact(answer: &str) -> Result<Fact, ClassificationParseError> {
    let mut valid = None;
    let mut category = None;
    let mut value = None;

    for line in answer.lines().map(|l| strip_bullet(clean_line(l))) {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let rest = rest.trim();
        match key.trim().to_lowercase().as_str() {
            "validity" => valid = Some(rest.eq_ignore_ascii_case("true")),
            "type" => category = Some(rest.to_lowercase()),
            "value" => value = Some(rest.to_string()),
            _ => {}
        }
    }

    Ok(Fact {
        valid: valid.ok_or(ClassificationParseError::MissingField("validity"))?,
        category: category.ok_or(ClassificationParseError::MissingField("type"))?,
        value: value.ok_or(ClassificationParseError::MissingField("value"))?,
    })
}

/// Parsed daily summary; tips are newline separated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryParts {
    pub summary: String,
    pub tips: String,
}

const SUMMARY_HEADING: &str = "### Summary";
const TIPS_HEADING: &str = "### Tips";

pub fn parse_daily_summary(answer: &str) -> Result<SummaryParts, ClassificationParseError> {
    let (summary, tips) = answer
        .split_once(TIPS_HEADING)
        .ok_or(ClassificationParseError::MissingTips)?;

    let summary = summary.replace(SUMMARY_HEADING, "").trim().to_string();
    let tips = tips
        .lines()
        .map(strip_bullet)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(SummaryParts { summary, tips })
}

/// Capitalise the first letter of every word
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Trim whitespace and markdown emphasis around a line
fn clean_line(line: &str) -> &str {
    line.trim().trim_matches(|c: char| c == '*' || c == '`' || c == '"').trim()
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return rest.trim();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mood() {
        assert_eq!(parse_mood("2"), Ok(Mood::Neutral));
        assert_eq!(parse_mood("  1 \n"), Ok(Mood::Sad));
        assert_eq!(parse_mood("mood: 0"), Ok(Mood::Happy));
        assert_eq!(
            parse_mood("maybe"),
            Err(ClassificationParseError::NoMood("maybe".to_string()))
        );
        assert_eq!(parse_mood("7"), Err(ClassificationParseError::MoodOutOfRange(7)));
    }

    #[test]
    fn test_parse_significance() {
        assert_eq!(
            parse_significance("special: first marathon finished"),
            Ok(Significance::Special("First Marathon Finished".to_string()))
        );
        assert_eq!(
            parse_significance("**Special:** \"new PUPPY\"."),
            Ok(Significance::Special("New Puppy".to_string()))
        );
        assert_eq!(
            parse_significance("special:"),
            Ok(Significance::Special(DEFAULT_TITLE.to_string()))
        );
        assert_eq!(parse_significance("Yes."), Ok(Significance::Positive));
        assert_eq!(parse_significance("\nno\n"), Ok(Significance::Discard));
        assert!(parse_significance("probably").is_err());
        assert!(parse_significance("").is_err());
    }

    #[test]
    fn test_parse_fact() {
        let fact = parse_fact("validity: true\ntype: Food\nvalue: The user likes biryani").unwrap();
        assert!(fact.is_storable());
        assert_eq!(fact.category, "food");
        assert_eq!(fact.value, "The user likes biryani");

        let name = parse_fact("validity: true\ntype: name\nvalue: Asha").unwrap();
        assert!(!name.is_storable());

        let invalid = parse_fact("- validity: false\n- type: none\n- value:").unwrap();
        assert!(!invalid.valid);
        assert!(!invalid.is_storable());

        assert_eq!(
            parse_fact("validity: true\nvalue: x"),
            Err(ClassificationParseError::MissingField("type"))
        );
    }

    #[test]
    fn test_parse_daily_summary() {
        let parts = parse_daily_summary(
            "### Summary\nA calm day with a good walk.\n\n### Tips\n- Stretch\n* Drink water\n• Sleep early\n2. Call a friend\n",
        )
        .unwrap();

        assert_eq!(parts.summary, "A calm day with a good walk.");
        assert_eq!(parts.tips, "Stretch\nDrink water\nSleep early\nCall a friend");

        assert_eq!(
            parse_daily_summary("### Summary\nno tips here"),
            Err(ClassificationParseError::MissingTips)
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("  my BIG   day "), "My Big Day");
        assert_eq!(title_case(""), "");
    }
}
