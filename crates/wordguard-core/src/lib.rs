//! WordGuard Core
//!
//! Core types and error handling shared across WordGuard components.
//!
//! This crate provides:
//! - Lexicon rows (forbidden words) and sensitive-word rows
//! - Match kinds and verdicts reported by the detectors
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ForbiddenWord, MatchKind, SensitiveWord, Verdict, WordId};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ForbiddenWord, MatchKind, SensitiveWord, Verdict, WordId};
}
