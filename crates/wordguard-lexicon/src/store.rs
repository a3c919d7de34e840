//! Lexicon persistence port
//!
//! The store is the source of truth; the automaton is rebuilt from it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;
use wordguard_core::{Error, ForbiddenWord, Result};

/// Durable storage for forbidden-word rows
#[async_trait]
pub trait LexiconStore: Send + Sync {
    /// Every lexicon row
    async fn load_all(&self) -> Result<Vec<ForbiddenWord>>;

    /// The subset of `words` that is already registered
    async fn find_existing(&self, words: &[String]) -> Result<HashSet<String>>;

    /// Insert one row; the word must not exist yet
    async fn insert(&self, word: &ForbiddenWord) -> Result<()>;

    /// Delete one row; false if it did not exist
    async fn delete(&self, word: &str) -> Result<bool>;

    /// Delete rows created in `[from, to)`, returning the deleted words
    async fn delete_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Whether a single word is registered
    async fn contains(&self, word: &str) -> Result<bool> {
        Ok(!self.find_existing(&[word.to_string()]).await?.is_empty())
    }
}

/// In-process lexicon store
#[derive(Debug, Default)]
pub struct InMemoryLexiconStore {
    rows: RwLock<Vec<ForbiddenWord>>,
}

impl InMemoryLexiconStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing rows
    pub fn with_words(words: impl IntoIterator<Item = ForbiddenWord>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.write();
            for word in words {
                if !rows.iter().any(|r| r.word == word.word) {
                    rows.push(word);
                }
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl LexiconStore for InMemoryLexiconStore {
    async fn load_all(&self) -> Result<Vec<ForbiddenWord>> {
        Ok(self.rows.read().clone())
    }

    async fn find_existing(&self, words: &[String]) -> Result<HashSet<String>> {
        let rows = self.rows.read();
        Ok(words
            .iter()
            .filter(|w| rows.iter().any(|r| &r.word == *w))
            .cloned()
            .collect())
    }

    async fn insert(&self, word: &ForbiddenWord) -> Result<()> {
        let mut rows = self.rows.write();
        if rows.iter().any(|r| r.word == word.word) {
            return Err(Error::store(format!(
                "unique constraint violated: '{}' already registered",
                word.word
            )));
        }
        rows.push(word.clone());
        Ok(())
    }

    async fn delete(&self, word: &str) -> Result<bool> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| r.word != word);
        Ok(rows.len() != before)
    }

    async fn delete_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut rows = self.rows.write();
        let mut deleted = Vec::new();
        rows.retain(|r| {
            let in_range = r.created_at >= from && r.created_at < to;
            if in_range {
                deleted.push(r.word.clone());
            }
            !in_range
        });
        Ok(deleted)
    }
}
