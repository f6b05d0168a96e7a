//! Word frequency accumulators.
//!
//! Four independent maps keyed by {title, text} × {positive, negative}. Maps
//! are ordered so serialized state is byte-stable for checksumming.

use super::{Label, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Mapping from normalized word to the number of records mentioning it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordCounts(BTreeMap<String, u64>);

impl WordCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one mention for every word in the set.
    pub fn add_words<'a>(&mut self, words: impl IntoIterator<Item = &'a String>) {
        for word in words {
            *self.0.entry(word.clone()).or_insert(0) += 1;
        }
    }

    pub fn get(&self, word: &str) -> u64 {
        self.0.get(word).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(w, c)| (w.as_str(), *c))
    }

    /// Keep only entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, u64) -> bool) {
        self.0.retain(|w, c| keep(w, *c));
    }

    /// The `n` most frequent words, ties broken alphabetically.
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for WordCounts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(w, c)| (w.into(), c)).collect())
    }
}

/// Which text field a word came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Text,
}

/// Names one of the four accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKey {
    TitlePositive,
    TitleNegative,
    TextPositive,
    TextNegative,
}

impl CountKey {
    /// All keys, in the order downstream consumers expect them.
    pub const ALL: [CountKey; 4] = [
        CountKey::TitlePositive,
        CountKey::TextPositive,
        CountKey::TitleNegative,
        CountKey::TextNegative,
    ];

    pub fn new(field: Field, label: Label) -> Self {
        match (field, label) {
            (Field::Title, Label::Positive) => Self::TitlePositive,
            (Field::Title, Label::Negative) => Self::TitleNegative,
            (Field::Text, Label::Positive) => Self::TextPositive,
            (Field::Text, Label::Negative) => Self::TextNegative,
        }
    }

    /// Stable name used in persisted files and artifact names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TitlePositive => "title_word_counts_pos",
            Self::TitleNegative => "title_word_counts_neg",
            Self::TextPositive => "text_word_counts_pos",
            Self::TextNegative => "text_word_counts_neg",
        }
    }
}

impl std::fmt::Display for CountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four frequency accumulators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulators {
    #[serde(rename = "title_word_counts_pos", default)]
    pub title_pos: WordCounts,
    #[serde(rename = "title_word_counts_neg", default)]
    pub title_neg: WordCounts,
    #[serde(rename = "text_word_counts_pos", default)]
    pub text_pos: WordCounts,
    #[serde(rename = "text_word_counts_neg", default)]
    pub text_neg: WordCounts,
}

impl Accumulators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: CountKey) -> &WordCounts {
        match key {
            CountKey::TitlePositive => &self.title_pos,
            CountKey::TitleNegative => &self.title_neg,
            CountKey::TextPositive => &self.text_pos,
            CountKey::TextNegative => &self.text_neg,
        }
    }

    pub fn get_mut(&mut self, key: CountKey) -> &mut WordCounts {
        match key {
            CountKey::TitlePositive => &mut self.title_pos,
            CountKey::TitleNegative => &mut self.title_neg,
            CountKey::TextPositive => &mut self.text_pos,
            CountKey::TextNegative => &mut self.text_neg,
        }
    }

    /// Fold one record's distinct title and text words into the accumulators
    /// selected by its label.
    pub fn fold(&mut self, record: &Record, title_words: &HashSet<String>, text_words: &HashSet<String>) {
        self.get_mut(CountKey::new(Field::Title, record.label))
            .add_words(title_words);
        self.get_mut(CountKey::new(Field::Text, record.label))
            .add_words(text_words);
    }

    pub fn is_empty(&self) -> bool {
        CountKey::ALL.iter().all(|k| self.get(*k).is_empty())
    }
}
