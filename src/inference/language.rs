//! Reply language resolution
//!
//! Detection is heuristic: the dominant Unicode script decides for
//! non-Latin text, and a small stop-word vote decides between the common
//! Latin-script languages. Anything inconclusive yields `None` and the
//! configured default applies.

/// Guesses the ISO 639-1 code of a piece of text
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<String>;
}

/// Pick the reply language: explicit, then detected, then the default
pub fn resolve_language(
    explicit: Option<&str>,
    question: &str,
    detector: &dyn LanguageDetector,
    default: &str,
) -> String {
    if let Some(code) = explicit.map(str::trim).filter(|c| !c.is_empty()) {
        return code.to_lowercase();
    }

    detector.detect(question).unwrap_or_else(|| {
        tracing::debug!(default = %default, "Language detection inconclusive");
        default.to_string()
    })
}

/// Script and stop-word based detector
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptDetector;

const MIN_LETTERS: usize = 3;

const STOP_WORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "is", "are", "i", "you", "my", "what", "how", "to", "of", "it", "am", "today"]),
    ("es", &["el", "la", "los", "las", "y", "es", "que", "de", "estoy", "yo", "mi", "qué", "cómo", "hoy"]),
    ("fr", &["le", "la", "les", "et", "est", "je", "suis", "tu", "mon", "ma", "que", "des", "aujourd'hui", "comment"]),
    ("de", &["der", "die", "das", "und", "ist", "ich", "bin", "du", "mein", "nicht", "wie", "heute", "was"]),
    ("it", &["il", "lo", "gli", "e", "è", "sono", "io", "mio", "che", "come", "oggi", "non", "di"]),
    ("pt", &["o", "os", "as", "e", "é", "estou", "eu", "meu", "que", "não", "como", "hoje", "do"]),
    ("nl", &["de", "het", "een", "en", "is", "ik", "ben", "mijn", "niet", "hoe", "vandaag", "wat"]),
];

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() < MIN_LETTERS {
            return None;
        }

        let mut latin = 0usize;
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        let mut kana = false;

        for c in letters {
            match script_of(c) {
                Some("latin") => latin += 1,
                Some(code) => {
                    kana |= code == "ja";
                    match counts.iter_mut().find(|(k, _)| *k == code) {
                        Some((_, n)) => *n += 1,
                        None => counts.push((code, 1)),
                    }
                }
                None => {}
            }
        }

        let dominant = counts.iter().max_by_key(|(_, n)| *n).copied();
        match dominant {
            Some((code, n)) if n >= latin => {
                // Kanji-heavy Japanese still carries some kana
                if code == "zh" && kana {
                    Some("ja".to_string())
                } else {
                    Some(code.to_string())
                }
            }
            _ => detect_latin(text),
        }
    }
}

fn script_of(c: char) -> Option<&'static str> {
    let code = match c as u32 {
        0x0041..=0x024F => "latin",
        0x0370..=0x03FF => "el",
        0x0400..=0x04FF => "ru",
        0x0590..=0x05FF => "he",
        0x0600..=0x06FF => "ar",
        0x0900..=0x097F => "hi",
        0x0980..=0x09FF => "bn",
        0x0A00..=0x0A7F => "pa",
        0x0A80..=0x0AFF => "gu",
        0x0B80..=0x0BFF => "ta",
        0x0C00..=0x0C7F => "te",
        0x0C80..=0x0CFF => "kn",
        0x0D00..=0x0D7F => "ml",
        0x0E00..=0x0E7F => "th",
        0x3040..=0x30FF => "ja",
        0x4E00..=0x9FFF => "zh",
        0xAC00..=0xD7AF => "ko",
        _ => return None,
    };
    Some(code)
}

fn detect_latin(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphabetic() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(&str, usize)> = None;
    let mut tied = false;

    for &(code, stop_words) in STOP_WORDS {
        let score = words.iter().filter(|w| stop_words.contains(w)).count();
        match best {
            Some((_, top)) if score > top => {
                best = Some((code, score));
                tied = false;
            }
            Some((_, top)) if score == top => tied = true,
            None => best = Some((code, score)),
            _ => {}
        }
    }

    match best {
        Some((code, score)) if score > 0 && !tied => Some(code.to_string()),
        _ => None,
    }
}
