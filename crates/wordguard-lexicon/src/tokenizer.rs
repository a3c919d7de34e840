//! Morphological tokenization and the meaningful-token filter
//!
//! Tags follow the Mecab-ko convention (`NNG`, `VV`, `JKS`, ...), so a real
//! morphological analyzer can be dropped in behind [`Tokenizer`].

use crate::config::LexiconConfig;
use std::collections::HashSet;
use std::sync::Arc;
use wordguard_core::Result;

/// A token and its part-of-speech tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub text: String,
    pub tag: String,
}

impl TaggedToken {
    pub fn new(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: tag.into(),
        }
    }

    /// Leading tag of a compound tag such as `VV+EC`
    pub fn primary_tag(&self) -> &str {
        self.tag.split('+').next().unwrap_or("")
    }
}

/// Morphological analyzer
pub trait Tokenizer: Send + Sync {
    /// Split `text` into tagged morphemes
    fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>>;
}

/// Trailing particles separated by [`RuleTokenizer`], longest first.
const PARTICLES: &[(&str, &str)] = &[
    ("에서", "JKB"),
    ("에게", "JKB"),
    ("한테", "JKB"),
    ("으로", "JKB"),
    ("까지", "JX"),
    ("부터", "JX"),
    ("처럼", "JKB"),
    ("보다", "JKB"),
    ("은", "JX"),
    ("는", "JX"),
    ("이", "JKS"),
    ("가", "JKS"),
    ("을", "JKO"),
    ("를", "JKO"),
    ("에", "JKB"),
    ("의", "JKG"),
    ("도", "JX"),
    ("로", "JKB"),
    ("와", "JKB"),
    ("과", "JKB"),
    ("만", "JX"),
    ("야", "JKV"),
    ("아", "JKV"),
];

/// Lightweight rule-based analyzer.
///
/// Splits on whitespace and punctuation, then peels one known particle off
/// the end of a Hangul word when at least two syllables remain. Without a
/// dictionary a trailing `이` or `가` may belong to the noun itself (`멍청이`),
/// so the unsplit word is kept as a noun alongside the stem. Words are tagged
/// `NNG`, numbers `SN`; it does not distinguish other content classes. Case is
/// preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTokenizer;

impl RuleTokenizer {
    pub fn new() -> Self {
        Self
    }

    fn is_hangul_syllable(c: char) -> bool {
        ('\u{AC00}'..='\u{D7A3}').contains(&c)
    }

    fn split_particle(word: &str) -> Option<(&str, &'static str, &'static str)> {
        if !word.chars().all(Self::is_hangul_syllable) {
            return None;
        }

        PARTICLES.iter().find_map(|(particle, tag)| {
            let stem = word.strip_suffix(particle)?;
            (stem.chars().count() >= 2).then_some((stem, *particle, *tag))
        })
    }
}

impl Tokenizer for RuleTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>> {
        let mut tokens = Vec::new();

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if word.chars().all(|c| c.is_numeric()) {
                tokens.push(TaggedToken::new(word, "SN"));
                continue;
            }

            tokens.push(TaggedToken::new(word, "NNG"));
            if let Some((stem, particle, tag)) = Self::split_particle(word) {
                tokens.push(TaggedToken::new(stem, "NNG"));
                tokens.push(TaggedToken::new(particle, tag));
            }
        }

        Ok(tokens)
    }
}

/// Extracts the set of content words from a message.
///
/// A token survives when its primary tag is in the allow-list; particle tags
/// (`J*`) never survive.
#[derive(Clone)]
pub struct TokenFilter {
    tokenizer: Arc<dyn Tokenizer>,
    allowed_tags: HashSet<String>,
}

impl TokenFilter {
    /// Create a filter with an explicit tag allow-list
    pub fn new(tokenizer: Arc<dyn Tokenizer>, allowed_tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokenizer,
            allowed_tags: allowed_tags.into_iter().collect(),
        }
    }

    /// Create a filter from lexicon configuration
    pub fn from_config(tokenizer: Arc<dyn Tokenizer>, config: &LexiconConfig) -> Self {
        Self::new(tokenizer, config.allowed_tags.iter().cloned())
    }

    fn keeps(&self, token: &TaggedToken) -> bool {
        let tag = token.primary_tag();
        !tag.starts_with('J') && self.allowed_tags.contains(tag)
    }

    /// Content words of `text`
    pub fn meaningful_tokens(&self, text: &str) -> Result<HashSet<String>> {
        Ok(self
            .tokenizer
            .tokenize(text)?
            .into_iter()
            .filter(|token| self.keeps(token))
            .map(|token| token.text)
            .collect())
    }
}

impl std::fmt::Debug for TokenFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFilter")
            .field("allowed_tags", &self.allowed_tags)
            .finish()
    }
}
