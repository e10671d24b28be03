//! Tokenization and phrase normalization.
//!
//! The same [`Tokenizer`] turns gazetteer names into index keys and
//! document text into the token stream that is scanned for them.

use geoparse_gazetteer_models::{Phrase, TokenizerConfig};
use regex::Regex;

/// Splits text into normalized tokens.
pub trait Tokenizer: Send + Sync {
    /// Tokenizes `text`. Tokens are lowercase and never contain whitespace.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Default tokenizer: lowercase unigrams, with punctuation and sentence
/// separators kept as tokens of their own.
#[derive(Debug, Clone)]
pub struct UnigramTokenizer {
    pattern: Regex,
}

impl UnigramTokenizer {
    /// Compiles the token pattern for a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the pattern cannot be compiled.
    pub fn new(config: &TokenizerConfig) -> Result<Self, regex::Error> {
        let mut separators: Vec<&str> = config
            .sentence_separators
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        // Longest first so "\r\n" wins over "\n".
        separators.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        separators.dedup();

        let punctuation = char_class(config.punctuation.chars());
        let excluded = char_class(
            config
                .whitespace
                .chars()
                .chain(config.punctuation.chars())
                .chain(separators.iter().flat_map(|s| s.chars())),
        );

        let mut branches: Vec<String> = separators.iter().map(|s| regex::escape(s)).collect();
        if !punctuation.is_empty() {
            branches.push(format!("[{punctuation}]"));
        }
        branches.push(format!(r"[^\s{excluded}]+"));

        let pattern = Regex::new(&branches.join("|"))?;
        log::trace!("Tokenizer pattern: {pattern}");

        Ok(Self { pattern })
    }
}

impl Tokenizer for UnigramTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Normalizes a gazetteer name into the phrase it is indexed under.
#[must_use]
pub fn normalize_phrase<T: Tokenizer + ?Sized>(tokenizer: &T, name: &str) -> Phrase {
    Phrase::from(tokenizer.tokenize(name))
}

fn char_class(chars: impl Iterator<Item = char>) -> String {
    let mut seen = Vec::new();
    for c in chars {
        if !seen.contains(&c) {
            seen.push(c);
        }
    }
    seen.into_iter()
        .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
        .collect()
}
