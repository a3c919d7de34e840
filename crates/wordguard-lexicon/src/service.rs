//! Lexicon mutation protocol
//!
//! Every mutation writes the store first and touches the automaton only after
//! the durable write succeeded. Mutations are serialized; checks never wait
//! on them.

use crate::automaton::{BuildSummary, InsertOutcome, LexiconAutomaton};
use crate::config::LexiconConfig;
use crate::decompose::PhoneticDecomposer;
use crate::detector::{fold_case, DetectionResult, ForbiddenMessageDetector};
use crate::store::LexiconStore;
use crate::tokenizer::{TokenFilter, Tokenizer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use wordguard_core::{Error, ForbiddenWord, Result};

/// Outcome of a single registration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Registration {
    /// Stored and added to the matcher
    Registered {
        entry: ForbiddenWord,
        patterns: InsertOutcome,
    },
    /// The word was already in the lexicon
    AlreadyExists { word: String },
}

/// Outcome of a bulk registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkRegistration {
    pub registered: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Lexicon facade used by the HTTP layer
pub struct LexiconService {
    store: Arc<dyn LexiconStore>,
    automaton: Arc<LexiconAutomaton>,
    decomposer: Arc<dyn PhoneticDecomposer>,
    detector: ForbiddenMessageDetector,
    writer: Mutex<()>,
}

impl LexiconService {
    /// Wire the service from its collaborators; the automaton starts unbuilt
    pub fn new(
        store: Arc<dyn LexiconStore>,
        tokenizer: Arc<dyn Tokenizer>,
        decomposer: Arc<dyn PhoneticDecomposer>,
        config: &LexiconConfig,
    ) -> Self {
        let automaton = Arc::new(LexiconAutomaton::from_config(config));
        let token_filter = TokenFilter::from_config(tokenizer, config);
        let detector = ForbiddenMessageDetector::new(
            Arc::clone(&automaton),
            token_filter,
            Arc::clone(&decomposer),
        );

        Self {
            store,
            automaton,
            decomposer,
            detector,
            writer: Mutex::new(()),
        }
    }

    /// Shared handle to the resident automaton
    pub fn automaton(&self) -> &Arc<LexiconAutomaton> {
        &self.automaton
    }

    /// Rebuild the automaton from the store.
    ///
    /// Returns `None` when the store holds no words (matcher disabled). On a
    /// store failure the current automaton is left untouched.
    pub async fn reload(&self) -> Result<Option<BuildSummary>> {
        let _writer = self.writer.lock().await;
        self.rebuild_from_store().await
    }

    async fn rebuild_from_store(&self) -> Result<Option<BuildSummary>> {
        let words = self.store.load_all().await?;

        match self.automaton.build(&words) {
            Ok(summary) => Ok(Some(summary)),
            Err(Error::EmptyLexicon) => {
                warn!("No forbidden words registered; lexicon matcher is disabled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop deleted words from the matcher without reading the store.
    ///
    /// The rows are already gone, so this never fails the caller: if the
    /// recompile fails the matcher is reloaded, and if that fails too it is
    /// disabled rather than left blocking deleted words.
    async fn forget(&self, words: &[String]) {
        let Err(e) = self.automaton.remove(words) else {
            return;
        };

        warn!("Failed to recompile lexicon after delete: {}; reloading", e);
        if let Err(e) = self.rebuild_from_store().await {
            error!("Lexicon reload after delete failed: {}; matcher disabled", e);
            self.automaton.clear();
        }
    }

    /// Prepare a lexicon row for `word`
    pub fn prepare(&self, word: &str) -> Result<ForbiddenWord> {
        let word = fold_case(word.trim());
        if word.is_empty() {
            return Err(Error::invalid_input("forbidden word must not be empty"));
        }
        let decomposed = self.decomposer.decompose(&word);
        Ok(ForbiddenWord::new(word, decomposed))
    }

    /// Register a single word
    pub async fn register(&self, word: &str) -> Result<Registration> {
        let entry = self.prepare(word)?;
        let _writer = self.writer.lock().await;

        if self.store.contains(&entry.word).await? {
            info!("'{}' is already a registered forbidden word", entry.word);
            return Ok(Registration::AlreadyExists { word: entry.word });
        }

        self.store.insert(&entry).await?;
        let patterns = self.automaton.insert(&entry)?;

        Ok(Registration::Registered { entry, patterns })
    }

    /// Register many words; already-registered words are skipped and
    /// per-word store failures are reported without aborting the batch
    pub async fn register_bulk(&self, words: &[String]) -> Result<BulkRegistration> {
        let _writer = self.writer.lock().await;

        let mut report = BulkRegistration::default();
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        for word in words {
            match self.prepare(word) {
                Ok(entry) if seen.insert(entry.word.clone()) => candidates.push(entry),
                Ok(entry) => report.skipped.push(entry.word),
                Err(_) => report.failed.push(word.clone()),
            }
        }

        let names: Vec<String> = candidates.iter().map(|e| e.word.clone()).collect();
        let existing = self.store.find_existing(&names).await?;

        let mut stored = Vec::new();
        for entry in candidates {
            if existing.contains(&entry.word) {
                report.skipped.push(entry.word);
                continue;
            }

            match self.store.insert(&entry).await {
                Ok(()) => stored.push(entry),
                Err(e) => {
                    warn!("Failed to register '{}': {}", entry.word, e);
                    report.failed.push(entry.word);
                }
            }
        }

        if !stored.is_empty() {
            self.automaton.insert_many(&stored)?;
        }
        report.registered = stored.into_iter().map(|e| e.word).collect();

        info!(
            "Bulk registration: {} registered, {} skipped, {} failed",
            report.registered.len(),
            report.skipped.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Every lexicon row
    pub async fn list(&self) -> Result<Vec<ForbiddenWord>> {
        self.store.load_all().await
    }

    /// Whether `word` is registered
    pub async fn contains(&self, word: &str) -> Result<bool> {
        self.store.contains(&fold_case(word.trim())).await
    }

    /// Delete one word and drop it from the matcher; false if it was not
    /// registered
    pub async fn delete(&self, word: &str) -> Result<bool> {
        let word = fold_case(word.trim());
        let _writer = self.writer.lock().await;

        if !self.store.delete(&word).await? {
            return Ok(false);
        }

        info!("Deleted forbidden word '{}'", word);
        self.forget(std::slice::from_ref(&word)).await;
        Ok(true)
    }

    /// Delete words registered in `[from, to)` and drop them from the matcher
    pub async fn delete_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if from >= to {
            return Err(Error::invalid_input("date range start must precede its end"));
        }

        let _writer = self.writer.lock().await;
        let deleted = self.store.delete_created_between(from, to).await?;

        if !deleted.is_empty() {
            info!("Deleted {} forbidden words created in range", deleted.len());
            self.forget(&deleted).await;
        }

        Ok(deleted)
    }

    /// Check a message against the current lexicon
    pub fn check(&self, message: &str) -> Result<DetectionResult> {
        self.detector.check(message)
    }
}
