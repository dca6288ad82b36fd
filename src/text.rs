//! Sentence splitting and the timing estimates used to highlight the
//! sentence being spoken.

use std::sync::OnceLock;

use regex::Regex;

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+|\s*\n\s*").expect("valid sentence regex"))
}

fn segment_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("valid segment regex"))
}

fn unsafe_filename_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("valid filename regex"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Split text into sentences after `.`, `!` or `?` followed by whitespace,
/// and at line breaks.
///
/// The terminating punctuation stays with its sentence; surrounding
/// whitespace is trimmed and empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_break().find_iter(text) {
        let end = if m.as_str().starts_with(&['.', '!', '?'][..]) {
            // punctuation is a single ASCII byte
            m.start() + 1
        } else {
            m.start()
        };
        push_trimmed(&mut sentences, &text[start..end]);
        start = m.end();
    }
    push_trimmed(&mut sentences, &text[start..]);
    log::trace!("Split text into {} sentences", sentences.len());
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

/// Split text on runs of newlines into the pieces handed to the engine.
pub fn segments(text: &str) -> Vec<&str> {
    segment_break()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collapse every whitespace run into a single space.
pub fn collapse_whitespace(line: &str) -> String {
    whitespace_run().replace_all(line, " ").trim().to_string()
}

/// Make `value` usable as a file name on every common filesystem.
pub fn safe_filename(value: &str, max_len: usize) -> String {
    let replaced = unsafe_filename_chars().replace_all(value, "_");
    let replaced = whitespace_run().replace_all(&replaced, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == '_' || c == ' ');
    let name = if trimmed.is_empty() { "Untitled" } else { trimmed };
    name.chars().take(max_len).collect()
}

/// Estimated start time and text position of every sentence in a chapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentenceTiming {
    /// Cumulative start offsets in milliseconds. One entry per sentence
    /// plus a final entry marking the estimated end of the chapter.
    pub offsets: Vec<u64>,
    /// Character position at which each sentence starts, assuming
    /// sentences are joined with a single space.
    pub char_positions: Vec<usize>,
}

impl SentenceTiming {
    /// Estimate timings from sentence lengths at `ms_per_char`.
    pub fn compute(sentences: &[String], ms_per_char: f64) -> Self {
        let mut offsets = Vec::with_capacity(sentences.len() + 1);
        let mut char_positions = Vec::with_capacity(sentences.len());
        offsets.push(0);

        let mut cumulative_ms = 0.0;
        let mut char_pos = 0;
        for sentence in sentences {
            let len = sentence.chars().count();
            char_positions.push(char_pos);
            char_pos += len + 1;

            cumulative_ms += len as f64 * ms_per_char;
            offsets.push(cumulative_ms as u64);
        }

        Self {
            offsets,
            char_positions,
        }
    }

    /// Index of the sentence playing at `offset_ms`, if any.
    pub fn sentence_at(&self, offset_ms: u64) -> Option<usize> {
        self.offsets
            .windows(2)
            .position(|w| w[0] <= offset_ms && offset_ms < w[1])
    }

    pub fn sentence_count(&self) -> usize {
        self.char_positions.len()
    }

    /// Estimated duration of the whole chapter.
    pub fn total_ms(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }
}
