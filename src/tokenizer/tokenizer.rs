use std::collections::{HashMap, HashSet};

use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Normalize a raw token: ASCII-uppercase, all non-alphabetic characters
/// stripped.
///
/// Term fingerprints assume this exact normalization; changing it reorders
/// the terms file.
pub fn normalize_term(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Splits raw document text into normalized terms with byte offsets.
///
/// No stemming — callers that want it run their own pipeline before
/// handing text over.
pub struct Tokenizer {
    min_token_len: usize,
    stopwords: Option<HashSet<String>>,
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        let stopwords = config.filter_stop_words.then(|| {
            get(LANGUAGE::English)
                .into_iter()
                .map(|w| normalize_term(&w))
                .collect()
        });
        Self {
            min_token_len: config.min_token_len,
            stopwords,
        }
    }

    pub fn is_stop_word(&self, term: &str) -> bool {
        self.stopwords
            .as_ref()
            .is_some_and(|set| set.contains(term))
    }

    /// Tokenize into (normalized term, byte offset of the token start).
    pub fn tokenize(&self, text: &str) -> Vec<(String, u32)> {
        let mut out = Vec::new();
        for (offset, word) in text.split_word_bound_indices() {
            let term = normalize_term(word);
            if term.len() < self.min_token_len || self.is_stop_word(&term) {
                continue;
            }
            out.push((term, offset as u32));
        }
        out
    }

    /// Tokenize a whole document into term -> occurrence offsets, the shape
    /// the posting list builder consumes.
    pub fn index_document(&self, text: &str) -> HashMap<String, Vec<u32>> {
        let mut terms: HashMap<String, Vec<u32>> = HashMap::new();
        for (term, offset) in self.tokenize(text) {
            terms.entry(term).or_default().push(offset);
        }
        terms
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_uppercases() {
        assert_eq!(normalize_term("quick"), "QUICK");
        assert_eq!(normalize_term("Fox's"), "FOXS");
        assert_eq!(normalize_term("123"), "");
    }

    #[test]
    fn test_tokenize_reports_byte_offsets() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("the quick brown fox");
        assert_eq!(
            tokens,
            vec![
                ("THE".to_string(), 0),
                ("QUICK".to_string(), 4),
                ("BROWN".to_string(), 10),
                ("FOX".to_string(), 16),
            ]
        );
    }

    #[test]
    fn test_short_tokens_dropped() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("a be sea");
        assert_eq!(tokens, vec![("SEA".to_string(), 5)]);
    }

    #[test]
    fn test_stop_word_filtering() {
        let config = TokenizerConfig {
            min_token_len: 3,
            filter_stop_words: true,
        };
        let tokenizer = Tokenizer::new(&config);
        assert!(tokenizer.is_stop_word("THE"));
        let tokens = tokenizer.tokenize("the quick fox");
        assert_eq!(
            tokens,
            vec![("QUICK".to_string(), 4), ("FOX".to_string(), 10)]
        );
    }

    #[test]
    fn test_index_document_collects_offsets() {
        let tokenizer = Tokenizer::default();
        let terms = tokenizer.index_document("fox sees fox");
        assert_eq!(terms.get("FOX"), Some(&vec![0, 9]));
        assert_eq!(terms.get("SEES"), Some(&vec![4]));
    }

    #[test]
    fn test_punctuation_folds_into_terms() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("Hello, World!");
        assert_eq!(
            tokens,
            vec![("HELLO".to_string(), 0), ("WORLD".to_string(), 7)]
        );
    }
}
