//! WordGuard Lexicon
//!
//! Forbidden-word screening for short user messages.
//!
//! A message is blocked when a registered word occurs in it and that
//! occurrence is also a content word of the message:
//! - Surface patterns catch the word as written
//! - Decomposed (jamo-level) patterns catch spaced-out and bare-jamo spellings
//! - The token filter suppresses fragments embedded inside longer words
//!
//! The matcher is an Aho-Corasick automaton that is rebuilt off to the side
//! and swapped in atomically on every mutation.

pub mod automaton;
pub mod config;
pub mod decompose;
pub mod detector;
pub mod service;
pub mod store;
pub mod tokenizer;

pub use automaton::{
    BuildSummary, CompiledLexicon, InsertOutcome, LexiconAutomaton, LexiconMatch, LexiconPattern,
    PatternInsert,
};
pub use config::LexiconConfig;
pub use decompose::{HangulDecomposer, PhoneticDecomposer};
pub use detector::{fold_case, DetectionResult, ForbiddenMessageDetector};
pub use service::{BulkRegistration, LexiconService, Registration};
pub use store::{InMemoryLexiconStore, LexiconStore};
pub use tokenizer::{RuleTokenizer, TaggedToken, TokenFilter, Tokenizer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::automaton::{LexiconAutomaton, LexiconMatch, PatternInsert};
    pub use crate::decompose::{HangulDecomposer, PhoneticDecomposer};
    pub use crate::detector::{DetectionResult, ForbiddenMessageDetector};
    pub use crate::service::LexiconService;
    pub use crate::store::{InMemoryLexiconStore, LexiconStore};
    pub use crate::tokenizer::{RuleTokenizer, TokenFilter, Tokenizer};
}
