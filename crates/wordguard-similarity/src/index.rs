//! Per-user sensitive-phrase index
//!
//! Users register phrases they do not want to see; incoming messages are
//! embedded once and compared by cosine similarity against every phrase the
//! user registered under the active embedding model.

use crate::config::SimilarityConfig;
use crate::embedding::EmbeddingProvider;
use crate::store::{SensitiveWordStore, Unlink};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};
use wordguard_core::{Error, Result, WordId};

/// Outcome of registering a phrase for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensitiveRegistration {
    pub word_id: WordId,
    /// The user link is new
    pub created: bool,
    /// The phrase had to be embedded and stored
    pub word_created: bool,
}

/// Nearest registered phrase for a message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityCheck {
    pub max_similarity: f32,
    pub most_similar_phrase: String,
    pub threshold: f32,
    pub is_match: bool,
    pub latency_us: u64,
}

/// Outcome of removing one phrase from a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub phrase: String,
    /// No user links remained, so the word row went too
    pub word_deleted: bool,
}

/// Outcome of clearing a user's phrases
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveAllReport {
    pub deleted_words: Vec<String>,
    pub count: usize,
    /// Word rows deleted because this user held their last link
    pub purged: usize,
}

/// Cosine of the angle between `a` and `b`; zero-norm vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::embedding(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Sensitive-word similarity index
pub struct SimilarityIndex {
    store: Arc<dyn SensitiveWordStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    default_threshold: f32,
    writer: Mutex<()>,
}

impl SimilarityIndex {
    pub fn new(
        store: Arc<dyn SensitiveWordStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &SimilarityConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            default_threshold: config.default_threshold,
            writer: Mutex::new(()),
        }
    }

    /// Threshold used when a check does not name one
    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    /// Active embedding model
    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    fn validate(user_id: &str, text: &str, what: &str) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(Error::invalid_input("user_id must not be empty"));
        }
        if text.trim().is_empty() {
            return Err(Error::invalid_input(format!("{} must not be empty", what)));
        }
        Ok(())
    }

    /// Register `phrase` for `user_id`.
    ///
    /// The phrase is embedded and stored at most once per model; later
    /// registrations by any user only add a link.
    pub async fn register(&self, user_id: &str, phrase: &str) -> Result<SensitiveRegistration> {
        Self::validate(user_id, phrase, "sentence")?;
        let phrase = phrase.trim();
        let model_id = self.embedder.model_id();

        let _writer = self.writer.lock().await;

        let (word_id, word_created) = match self.store.find_word(phrase, model_id).await? {
            Some(id) => (id, false),
            None => {
                let embedding = self.embedder.embed(phrase).await?;
                let id = self.store.create_word(phrase, &embedding, model_id).await?;
                debug!("Embedded sensitive phrase '{}' as word {}", phrase, id);
                (id, true)
            }
        };

        let created = self.store.link(user_id, word_id).await?;
        if created {
            info!("Registered sensitive phrase '{}' for user {}", phrase, user_id);
        }

        Ok(SensitiveRegistration {
            word_id,
            created,
            word_created,
        })
    }

    /// Phrases registered by `user_id`
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        self.store.phrases_for_user(user_id).await
    }

    /// Compare `message` with the user's phrases using the default threshold
    pub async fn check_default(
        &self,
        user_id: &str,
        message: &str,
    ) -> Result<Option<SimilarityCheck>> {
        self.check(user_id, message, self.default_threshold).await
    }

    /// Compare `message` with the user's phrases.
    ///
    /// `None` when the user has nothing registered under the active model.
    pub async fn check(
        &self,
        user_id: &str,
        message: &str,
        threshold: f32,
    ) -> Result<Option<SimilarityCheck>> {
        let start = Instant::now();
        metrics::counter!("wordguard_similarity_checks_total").increment(1);

        let words = self
            .store
            .words_for_user(user_id, self.embedder.model_id())
            .await?;
        if words.is_empty() {
            debug!("User {} has no sensitive phrases for {}", user_id, self.model_id());
            return Ok(None);
        }

        let query = self.embedder.embed(message).await?;

        let mut best: Option<(f32, &str)> = None;
        for word in &words {
            let score = cosine_similarity(&query, &word.embedding)?;
            if best.map_or(true, |(max, _)| score > max) {
                best = Some((score, &word.phrase));
            }
        }

        let Some((max_similarity, phrase)) = best else {
            return Ok(None);
        };

        let latency_us = start.elapsed().as_micros() as u64;
        let is_match = max_similarity >= threshold;
        metrics::histogram!("wordguard_similarity_latency_us").record(latency_us as f64);
        if is_match {
            metrics::counter!("wordguard_similarity_matches_total").increment(1);
        }

        Ok(Some(SimilarityCheck {
            max_similarity,
            most_similar_phrase: phrase.to_string(),
            threshold,
            is_match,
            latency_us,
        }))
    }

    /// Remove one phrase from a user, deleting the word on its last link
    pub async fn remove(&self, user_id: &str, phrase: &str) -> Result<Removal> {
        Self::validate(user_id, phrase, "sentence")?;
        let phrase = phrase.trim();

        let _writer = self.writer.lock().await;

        let word_id = self
            .store
            .find_word(phrase, self.embedder.model_id())
            .await?
            .ok_or_else(|| Error::NotFound(phrase.to_string()))?;

        match self.store.unlink(user_id, word_id).await? {
            Unlink::NotLinked => Err(Error::NotLinked {
                user_id: user_id.to_string(),
                phrase: phrase.to_string(),
            }),
            Unlink::Unlinked { word_deleted } => {
                info!(
                    "Removed sensitive phrase '{}' from user {} (word deleted: {})",
                    phrase, user_id, word_deleted
                );
                Ok(Removal {
                    phrase: phrase.to_string(),
                    word_deleted,
                })
            }
        }
    }

    /// Remove every phrase of a user
    pub async fn remove_all(&self, user_id: &str) -> Result<RemoveAllReport> {
        let _writer = self.writer.lock().await;

        let removed = self.store.unlink_all(user_id).await?;
        if removed.is_empty() {
            return Err(Error::NoWords(user_id.to_string()));
        }

        let purged = removed.iter().filter(|w| w.word_deleted).count();
        let deleted_words: Vec<String> = removed.into_iter().map(|w| w.phrase).collect();
        info!(
            "Removed {} sensitive phrases from user {} ({} words purged)",
            deleted_words.len(),
            user_id,
            purged
        );

        Ok(RemoveAllReport {
            count: deleted_words.len(),
            deleted_words,
            purged,
        })
    }
}
