//! Timestamped words and token normalization

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// A transcribed word with its timing in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    #[must_use]
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Duration as reported by the source (may be zero or negative)
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Lowercase a token and strip everything except word characters and apostrophes.
///
/// Returns an empty string for punctuation-only tokens.
#[must_use]
pub fn normalize_word(token: &str) -> String {
    static NON_WORD: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"[^\w']").expect("static regex"));

    NON_WORD.replace_all(&token.to_lowercase(), "").into_owned()
}

/// Filter a raw transcript down to displayable words.
///
/// Drops tokens that normalize to nothing or carry non-finite timestamps,
/// trims surrounding whitespace, and rounds times to milliseconds.
#[must_use]
pub fn prepare_words(raw: impl IntoIterator<Item = Word>) -> Vec<Word> {
    raw.into_iter()
        .filter_map(|w| {
            if normalize_word(&w.text).is_empty() {
                return None;
            }
            if !w.start.is_finite() || !w.end.is_finite() {
                debug!("Dropping {:?}: non-finite timestamps", w.text);
                return None;
            }
            Some(Word {
                text: w.text.trim().to_string(),
                start: round_millis(w.start),
                end: round_millis(w.end),
            })
        })
        .collect()
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
