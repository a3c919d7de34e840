//! Error types for WordGuard

/// Result type alias using WordGuard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for WordGuard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No forbidden words are available to build the matcher from
    #[error("lexicon is empty")]
    EmptyLexicon,

    /// The phrase has no sensitive-word row
    #[error("sensitive word not found: {0}")]
    NotFound(String),

    /// The phrase exists but is not linked to the user
    #[error("sensitive word '{phrase}' is not registered for user '{user_id}'")]
    NotLinked { user_id: String, phrase: String },

    /// The user has no registered sensitive words
    #[error("user '{0}' has no registered sensitive words")]
    NoWords(String),

    /// Embedding provider failures
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Persistence failures
    #[error("store error: {0}")]
    Store(String),

    /// Morphological tokenizer failures
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Rejected caller input (empty word, malformed range, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create a new store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new tokenizer error
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error describes a missing or unlinked resource rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NotLinked { .. } | Self::NoWords(_)
        )
    }
}
