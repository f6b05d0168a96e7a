//! Preparation of raw counts for rendering.
//!
//! Drops function words, punctuation and short tokens, then drops anything
//! below a fraction of the remaining total. Raw accumulators are never
//! filtered in place; this runs on copies handed to downstream consumers.

use crate::models::{Accumulators, CountKey, FilterConfig, WordCounts};
use std::collections::HashSet;

/// Built-in list of words too common to be interesting.
pub const COMMON_WORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "are",
    "was", "were", "'re", "on", "with", "he", "as", "you", "do", "at", "this", "but", "his", "by",
    "from", "they", "we", "say", "her", "she", "or", "an", "will", "my", "one", "all", "would",
    "there", "their", "what", "so", "up", "out", "if", "about", "who", "get", "which", "go", "me",
    "when", "make", "can", "like", "time", "no", "just", "him", "'ll", "know", "take", "people",
    "into", "year", "your", "good", "some", "could", "them", "see", "other", "than", "then", "now",
    "look", "only", "come", "its", "over", "think", "also", "back", "after", "use", "two", "how",
    "our", "work", "first", "well", "way", "even", "new", "want", "because", "any", "these",
    "give", "day", "most", "us", ",", ".", "!", "?", ":", ";", "[", "]", "(", ")", "n't", "...",
    "....", "'ve", "'d", "did", "should", "does", "has", "had", "very", "much", "more",
];

/// Filters a word-count map down to the words worth rendering.
#[derive(Debug, Clone)]
pub struct WordFilter {
    common: HashSet<String>,
    min_word_length: usize,
    freq_threshold: f64,
}

impl Default for WordFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

impl WordFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let common = COMMON_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(config.extra_common_words.iter().map(|w| w.to_lowercase()))
            .collect();

        Self {
            common,
            min_word_length: config.min_word_length,
            freq_threshold: config.freq_threshold,
        }
    }

    /// Whether `word` survives the common/short word pass.
    pub fn is_candidate(&self, word: &str) -> bool {
        !self.common.contains(word) && word.chars().count() >= self.min_word_length
    }

    /// Apply both passes to a copy of `counts`.
    ///
    /// The threshold is computed over the words left after the first pass.
    pub fn apply(&self, counts: &WordCounts) -> WordCounts {
        let mut kept = counts.clone();
        kept.retain(|word, _| self.is_candidate(word));

        let min_count = kept.total() as f64 * self.freq_threshold;
        kept.retain(|_, count| count as f64 >= min_count);
        kept
    }

    /// Apply the filter to all four accumulators.
    pub fn apply_all(&self, accumulators: &Accumulators) -> Accumulators {
        let mut prepared = Accumulators::new();
        for key in CountKey::ALL {
            *prepared.get_mut(key) = self.apply(accumulators.get(key));
        }
        prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_common_and_short_words() {
        let counts: WordCounts = [("the", 40), ("ok", 9), ("excellent", 3), (",", 12), ("n't", 4)]
            .into_iter()
            .collect();
        let kept = WordFilter::default().apply(&counts);
        assert_eq!(kept.iter().collect::<Vec<_>>(), vec![("excellent", 3)]);
    }

    #[test]
    fn test_threshold_is_relative_to_filtered_total() {
        let config = FilterConfig {
            freq_threshold: 0.1,
            ..Default::default()
        };
        // total after first pass = 100; min count = 10
        let counts: WordCounts = [("battery", 60), ("screen", 31), ("hinge", 9), ("the", 1000)]
            .into_iter()
            .collect();
        let kept = WordFilter::new(&config).apply(&counts);
        assert_eq!(kept.get("battery"), 60);
        assert_eq!(kept.get("screen"), 31);
        assert_eq!(kept.get("hinge"), 0);
        assert_eq!(kept.get("the"), 0);
    }

    #[test]
    fn test_extra_common_words_and_char_length() {
        let config = FilterConfig {
            extra_common_words: vec!["Product".to_string()],
            ..Default::default()
        };
        let filter = WordFilter::new(&config);
        assert!(!filter.is_candidate("product"));
        // three characters, six bytes
        assert!(filter.is_candidate("çàé"));
        assert!(!filter.is_candidate("çà"));
    }

    #[test]
    fn test_apply_all_leaves_input_untouched() {
        let mut acc = Accumulators::new();
        acc.text_neg = [("broken", 5), ("it", 5)].into_iter().collect();
        let prepared = WordFilter::default().apply_all(&acc);
        assert_eq!(prepared.text_neg.get("broken"), 5);
        assert_eq!(prepared.text_neg.get("it"), 0);
        assert_eq!(acc.text_neg.get("it"), 5);
    }
}
