//! Word tokenizer.
//!
//! Lower-cases input and segments it on Unicode word boundaries, splitting
//! English contractions the way Treebank tokenizers do (`don't` → `do` +
//! `n't`) and keeping punctuation runs as their own tokens. Hyphenated words
//! and digit-grouped numbers (`well-known`, `1,000`) stay whole. Output is a set:
//! a record mentioning a word ten times counts once.

use std::collections::HashSet;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\d+(?:[.,]\d+)+|\w+(?:[-'’]\w+)*|[^\w\s]+").expect("valid token pattern")
});

/// Turns free text into a set of normalized words.
pub trait Tokenize {
    fn tokenize(&self, text: &str) -> HashSet<String>;
}

/// Default tokenizer: Unicode word segmentation with contraction splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenize for WordTokenizer {
    fn tokenize(&self, text: &str) -> HashSet<String> {
        tokenize(text)
    }
}

/// Tokenize `text` into its distinct lower-cased tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase().replace('’', "'");
    let mut words = HashSet::new();

    for m in TOKEN_RE.find_iter(&lowered) {
        let token = m.as_str();
        match split_contraction(token) {
            Some((stem, suffix)) => {
                if !stem.is_empty() {
                    words.insert(stem.to_string());
                }
                words.insert(suffix.to_string());
            }
            None => {
                words.insert(token.to_string());
            }
        }
    }

    words
}

/// Split a word containing an apostrophe into stem and clitic.
fn split_contraction(token: &str) -> Option<(&str, &str)> {
    if token.len() > 3 && token.ends_with("n't") {
        let at = token.len() - 3;
        return Some((&token[..at], &token[at..]));
    }
    let at = token.rfind('\'')?;
    if at == 0 {
        return None;
    }
    Some((&token[..at], &token[at..]))
}
