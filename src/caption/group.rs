//! Fixed-size caption grouping

use serde::{Deserialize, Serialize};

use super::{CaptionError, Result, Word};

/// Words shown together on one caption line
pub const GROUP_SIZE: usize = 3;

/// A run of consecutive words displayed as one line, one word highlighted at a time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionGroup {
    pub words: Vec<Word>,
}

impl CaptionGroup {
    /// Display texts in order
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }

    /// Raw start of the first word
    #[must_use]
    pub fn start(&self) -> Option<f64> {
        self.words.first().map(|w| w.start)
    }
}

/// Partition words into consecutive groups of [`GROUP_SIZE`], last one possibly shorter.
pub fn group_words(words: &[Word]) -> Result<Vec<CaptionGroup>> {
    if words.is_empty() {
        return Err(CaptionError::EmptyInput);
    }

    Ok(words
        .chunks(GROUP_SIZE)
        .map(|chunk| CaptionGroup {
            words: chunk.to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> Vec<Word> {
        (0..n)
            .map(|i| Word::new(format!("w{i}"), i as f64 * 0.3, (i + 1) as f64 * 0.3))
            .collect()
    }

    #[test]
    fn test_group_counts() {
        for n in 1..=10 {
            let groups = group_words(&words(n)).unwrap();
            assert_eq!(groups.len(), n.div_ceil(GROUP_SIZE), "n = {n}");
            assert!(groups.iter().all(|g| !g.words.is_empty()));
            assert!(groups.iter().all(|g| g.words.len() <= GROUP_SIZE));
        }
    }

    #[test]
    fn test_group_preserves_order() {
        let input = words(7);
        let groups = group_words(&input).unwrap();
        let flattened: Vec<Word> = groups.into_iter().flat_map(|g| g.words).collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn test_last_group_shorter() {
        let groups = group_words(&words(5)).unwrap();
        assert_eq!(groups[0].texts(), vec!["w0", "w1", "w2"]);
        assert_eq!(groups[1].texts(), vec!["w3", "w4"]);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(group_words(&[]), Err(CaptionError::EmptyInput)));
    }
}
