//! Core types for WordGuard

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a sensitive-word row
pub type WordId = i64;

/// A registered forbidden word (one lexicon row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForbiddenWord {
    /// Canonical surface form, unique across the lexicon
    pub word: String,

    /// Phonetic decomposition of `word` (syllable markers removed, spaces kept)
    pub decomposed_word: String,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl ForbiddenWord {
    /// Create a new lexicon row stamped with the current time
    pub fn new(word: impl Into<String>, decomposed_word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            decomposed_word: decomposed_word.into(),
            created_at: Utc::now(),
        }
    }

    /// Override the registration timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Decomposed form with whitespace and ASCII punctuation removed
    pub fn stripped_decomposition(&self) -> String {
        self.decomposed_word
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
            .collect()
    }
}

/// Which pattern class produced a lexicon match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The word's literal written form
    Surface,
    /// The word's jamo-level decomposition
    Decomposed,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Surface => "surface",
            Self::Decomposed => "decomposed",
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a forbidden-message check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Blocked,
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }
}

/// A user-registrable sensitive phrase with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveWord {
    /// Row identity
    pub word_id: WordId,

    /// The phrase as registered
    pub phrase: String,

    /// Sentence embedding computed once at first registration
    pub embedding: Vec<f32>,

    /// Embedding model the vector was produced with
    pub model_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stripped_decomposition() {
        let word = ForbiddenWord::new("바보", "ㅂㅏ ㅂㅗ");
        assert_eq!(word.stripped_decomposition(), "ㅂㅏㅂㅗ");
    }

    #[test]
    fn test_match_kind_serde() {
        let json = serde_json::to_string(&MatchKind::Decomposed).unwrap();
        assert_eq!(json, "\"decomposed\"");
        assert_eq!(MatchKind::Surface.to_string(), "surface");
    }

    #[test]
    fn test_verdict() {
        assert!(Verdict::Blocked.is_blocked());
        assert!(!Verdict::Pass.is_blocked());
    }
}
