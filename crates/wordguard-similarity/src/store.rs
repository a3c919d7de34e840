//! Sensitive-word persistence port and its in-memory implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use wordguard_core::{Result, SensitiveWord, WordId};

/// Result of removing one user link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlink {
    /// The word exists but was not linked to the user
    NotLinked,
    /// The link was removed; `word_deleted` when it was the last one
    Unlinked { word_deleted: bool },
}

/// One phrase dropped by [`SensitiveWordStore::unlink_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedWord {
    pub phrase: String,
    pub word_deleted: bool,
}

/// Sensitive-word storage.
///
/// Word rows are unique per (phrase, model_id). A row lives as long as at
/// least one user links to it; unlinking the last user deletes it in the same
/// atomic step.
#[async_trait]
pub trait SensitiveWordStore: Send + Sync {
    /// Word id for `phrase` under `model_id`
    async fn find_word(&self, phrase: &str, model_id: &str) -> Result<Option<WordId>>;

    /// Create a word row and return its id
    async fn create_word(&self, phrase: &str, embedding: &[f32], model_id: &str)
        -> Result<WordId>;

    /// Link a user to a word; false when the link already existed
    async fn link(&self, user_id: &str, word_id: WordId) -> Result<bool>;

    /// Words linked to `user_id` that were embedded by `model_id`
    async fn words_for_user(&self, user_id: &str, model_id: &str) -> Result<Vec<SensitiveWord>>;

    /// Every phrase linked to `user_id`, across models
    async fn phrases_for_user(&self, user_id: &str) -> Result<Vec<String>>;

    /// Remove one link, deleting the word when no links remain
    async fn unlink(&self, user_id: &str, word_id: WordId) -> Result<Unlink>;

    /// Remove every link of `user_id` with the same per-word cascade
    async fn unlink_all(&self, user_id: &str) -> Result<Vec<UnlinkedWord>>;
}

#[derive(Debug, Default)]
struct Tables {
    next_id: WordId,
    words: BTreeMap<WordId, SensitiveWord>,
    links: BTreeSet<(String, WordId)>,
}

impl Tables {
    fn user_word_ids(&self, user_id: &str) -> Vec<WordId> {
        self.links
            .range((user_id.to_string(), WordId::MIN)..=(user_id.to_string(), WordId::MAX))
            .map(|(_, id)| *id)
            .collect()
    }

    fn remove_link(&mut self, user_id: &str, word_id: WordId) -> Unlink {
        if !self.links.remove(&(user_id.to_string(), word_id)) {
            return Unlink::NotLinked;
        }

        let still_linked = self.links.iter().any(|(_, id)| *id == word_id);
        if !still_linked {
            self.words.remove(&word_id);
        }

        Unlink::Unlinked {
            word_deleted: !still_linked,
        }
    }
}

/// Sensitive-word store held in process memory; one lock covers both tables
#[derive(Debug, Default)]
pub struct InMemorySensitiveWordStore {
    tables: Mutex<Tables>,
}

impl InMemorySensitiveWordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of word rows
    pub fn word_count(&self) -> usize {
        self.tables.lock().words.len()
    }

    /// Number of user links
    pub fn link_count(&self) -> usize {
        self.tables.lock().links.len()
    }
}

#[async_trait]
impl SensitiveWordStore for InMemorySensitiveWordStore {
    async fn find_word(&self, phrase: &str, model_id: &str) -> Result<Option<WordId>> {
        Ok(self
            .tables
            .lock()
            .words
            .values()
            .find(|w| w.phrase == phrase && w.model_id == model_id)
            .map(|w| w.word_id))
    }

    async fn create_word(
        &self,
        phrase: &str,
        embedding: &[f32],
        model_id: &str,
    ) -> Result<WordId> {
        let mut tables = self.tables.lock();
        tables.next_id += 1;
        let word_id = tables.next_id;

        tables.words.insert(
            word_id,
            SensitiveWord {
                word_id,
                phrase: phrase.to_string(),
                embedding: embedding.to_vec(),
                model_id: model_id.to_string(),
            },
        );

        Ok(word_id)
    }

    async fn link(&self, user_id: &str, word_id: WordId) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .links
            .insert((user_id.to_string(), word_id)))
    }

    async fn words_for_user(&self, user_id: &str, model_id: &str) -> Result<Vec<SensitiveWord>> {
        let tables = self.tables.lock();
        Ok(tables
            .user_word_ids(user_id)
            .into_iter()
            .filter_map(|id| tables.words.get(&id))
            .filter(|w| w.model_id == model_id)
            .cloned()
            .collect())
    }

    async fn phrases_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let tables = self.tables.lock();
        Ok(tables
            .user_word_ids(user_id)
            .into_iter()
            .filter_map(|id| tables.words.get(&id))
            .map(|w| w.phrase.clone())
            .collect())
    }

    async fn unlink(&self, user_id: &str, word_id: WordId) -> Result<Unlink> {
        Ok(self.tables.lock().remove_link(user_id, word_id))
    }

    async fn unlink_all(&self, user_id: &str) -> Result<Vec<UnlinkedWord>> {
        let mut tables = self.tables.lock();
        let mut removed = Vec::new();

        for word_id in tables.user_word_ids(user_id) {
            let phrase = tables
                .words
                .get(&word_id)
                .map(|w| w.phrase.clone())
                .unwrap_or_default();

            if let Unlink::Unlinked { word_deleted } = tables.remove_link(user_id, word_id) {
                removed.push(UnlinkedWord {
                    phrase,
                    word_deleted,
                });
            }
        }

        Ok(removed)
    }
}
