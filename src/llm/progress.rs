//! Pull progress formatting
//!
//! `ollama pull` prints two kinds of progress lines:
//!
//! ```text
//! <status>: <pct>%[ anything]                       -> "<status>: <pct>%"
//! <status> <n><unit>/<n><unit> (<overall>)[ ...]    -> "<status>: <n><unit> of <n><unit> (<overall>)"
//! ```
//!
//! Every other line is passed through unchanged.

use regex::Regex;
use std::sync::OnceLock;

fn percent_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<status>[^:]+?):\s*(?P<pct>\d{1,3}(?:\.\d+)?)\s*%")
            .expect("percent pattern is valid")
    })
}

fn size_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<status>.+?)\s+(?P<done>\d+(?:\.\d+)?\s?[KMGT]?i?B)\s*/\s*(?P<total>\d+(?:\.\d+)?\s?[KMGT]?i?B)\s*\((?P<overall>[^)]*)\)",
        )
        .expect("size pattern is valid")
    })
}

fn ansi_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi pattern is valid"))
}

/// Reformat one line of pull output for display
pub fn format_progress_line(line: &str) -> String {
    let line = line.trim();

    if let Some(caps) = percent_line().captures(line) {
        return format!("{}: {}%", caps["status"].trim(), &caps["pct"]);
    }

    if let Some(caps) = size_line().captures(line) {
        return format!(
            "{}: {} of {} ({})",
            caps["status"].trim(),
            &caps["done"],
            &caps["total"],
            caps["overall"].trim()
        );
    }

    line.to_string()
}

/// Remove terminal control sequences
pub fn strip_ansi(text: &str) -> String {
    ansi_escape().replace_all(text, "").into_owned()
}

/// Splits raw subprocess output into display lines.
///
/// Carriage returns count as line breaks because the pull progress bar
/// redraws itself in place. Bytes are held until a line is complete, so a
/// character cut by a read boundary decodes intact.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every completed non-empty line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            push_clean(&mut lines, &line);
        }
        lines
    }

    /// Flush the unterminated remainder
    pub fn finish(self) -> Option<String> {
        let mut lines = Vec::new();
        push_clean(&mut lines, &self.partial);
        lines.pop()
    }
}

fn push_clean(lines: &mut Vec<String>, raw: &[u8]) {
    let clean = strip_ansi(&String::from_utf8_lossy(raw));
    let clean = clean.trim();
    if !clean.is_empty() {
        lines.push(clean.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_lines() {
        assert_eq!(
            format_progress_line("pulling manifest: 100%"),
            "pulling manifest: 100%"
        );
        assert_eq!(
            format_progress_line("pulling 8eeb52dfb3bb:  45% ▕███████         ▏ 1.2 GB"),
            "pulling 8eeb52dfb3bb: 45%"
        );
    }

    #[test]
    fn test_size_lines() {
        assert_eq!(
            format_progress_line("downloading 1.2GB/2.0GB (60%)"),
            "downloading: 1.2GB of 2.0GB (60%)"
        );
        assert_eq!(
            format_progress_line("pulling layer 512 MB/1.5 GB (33%, 12 MB/s)"),
            "pulling layer: 512 MB of 1.5 GB (33%, 12 MB/s)"
        );
    }

    #[test]
    fn test_other_lines_verbatim() {
        assert_eq!(
            format_progress_line("verifying sha256 digest"),
            "verifying sha256 digest"
        );
        assert_eq!(format_progress_line("success"), "success");
    }

    #[test]
    fn test_splitter_handles_carriage_returns_and_ansi() {
        let mut splitter = LineSplitter::new();

        let lines = splitter.push("pulling manifest \u{1b}[?25l\rpulling abc:  10%".as_bytes());
        assert_eq!(lines, vec!["pulling manifest"]);

        let lines = splitter.push(b"\rpulling abc:  20%\n\nverif");
        assert_eq!(lines, vec!["pulling abc:  10%", "pulling abc:  20%"]);

        assert_eq!(splitter.finish().as_deref(), Some("verif"));
    }

    #[test]
    fn test_splitter_keeps_characters_cut_across_reads() {
        let mut splitter = LineSplitter::new();
        let bar = "pulling abc:  50% ▕███▏\n".as_bytes();
        // inside the three-byte encoding of the first bar glyph
        let cut = "pulling abc:  50% ".len() + 1;

        assert!(splitter.push(&bar[..cut]).is_empty());
        let lines = splitter.push(&bar[cut..]);

        assert_eq!(lines, vec!["pulling abc:  50% ▕███▏"]);
        assert!(!lines[0].contains('\u{fffd}'));
        assert_eq!(splitter.finish(), None);
    }
}
