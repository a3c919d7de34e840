//! Lexicon automaton
//!
//! An Aho-Corasick matcher over two pattern classes: each forbidden word's
//! surface form, and (when long enough and distinct) its compact jamo
//! decomposition. Every pattern is tagged with the canonical word it came
//! from.
//!
//! The compiled matcher is immutable. Mutations clone the current pattern
//! set, extend it, compile a fresh matcher off to the side, and swap the
//! shared handle, so concurrent scans always see a complete matcher.

use crate::config::{LexiconConfig, MIN_DECOMPOSED_LEN};
use aho_corasick::{AhoCorasick, MatchKind as AcMatchKind};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use wordguard_core::{Error, ForbiddenWord, MatchKind, Result};

/// A pattern registered in the automaton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconPattern {
    /// Text searched for
    pub text: String,

    /// Canonical word the pattern belongs to
    pub word: String,

    /// Pattern class
    pub kind: MatchKind,
}

/// What happened to one pattern during insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternInsert {
    /// Newly registered
    Added,
    /// Another pattern with identical text already exists; no-op
    AlreadyPresent,
    /// Below the minimum length (or empty)
    TooShort,
    /// Decomposed form identical to the surface form
    SameAsSurface,
}

/// Per-word result of an insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub word: String,
    pub surface: PatternInsert,
    pub decomposed: PatternInsert,
}

impl InsertOutcome {
    /// Whether any pattern was newly registered
    pub fn is_new(&self) -> bool {
        self.surface == PatternInsert::Added || self.decomposed == PatternInsert::Added
    }
}

/// Pattern counts after a full build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub words: usize,
    pub surface_patterns: usize,
    pub decomposed_patterns: usize,
}

/// One pattern occurrence in a scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconMatch {
    /// Byte offset where the occurrence starts
    pub start: usize,

    /// Byte offset just past the occurrence
    pub end: usize,

    /// Matched pattern text
    pub pattern: String,

    /// Canonical word of the pattern
    pub word: String,

    /// Pattern class
    pub kind: MatchKind,
}

/// Uncompiled, deduplicated pattern list and the rows it was built from
#[derive(Debug, Clone)]
struct PatternSet {
    patterns: Vec<LexiconPattern>,
    texts: HashSet<String>,
    words: HashSet<String>,
    entries: Vec<ForbiddenWord>,
    entry_words: HashSet<String>,
    min_decomposed_len: usize,
}

impl PatternSet {
    fn new(min_decomposed_len: usize) -> Self {
        Self {
            patterns: Vec::new(),
            texts: HashSet::new(),
            words: HashSet::new(),
            entries: Vec::new(),
            entry_words: HashSet::new(),
            min_decomposed_len,
        }
    }

    /// Re-derive the set from the remaining rows, so a pattern shared with a
    /// removed word is re-attributed to the word that still owns it
    fn without(&self, removed: &HashSet<&str>) -> Self {
        let mut set = Self::new(self.min_decomposed_len);
        for entry in &self.entries {
            if !removed.contains(entry.word.as_str()) {
                set.add(entry);
            }
        }
        set
    }

    fn push(&mut self, text: String, word: &str, kind: MatchKind) -> PatternInsert {
        if self.texts.contains(&text) {
            return PatternInsert::AlreadyPresent;
        }

        self.texts.insert(text.clone());
        self.words.insert(word.to_string());
        self.patterns.push(LexiconPattern {
            text,
            word: word.to_string(),
            kind,
        });
        PatternInsert::Added
    }

    fn add(&mut self, entry: &ForbiddenWord) -> InsertOutcome {
        if self.entry_words.insert(entry.word.clone()) {
            self.entries.push(entry.clone());
        }

        let surface = if entry.word.is_empty() {
            PatternInsert::TooShort
        } else {
            self.push(entry.word.clone(), &entry.word, MatchKind::Surface)
        };

        let compact = entry.stripped_decomposition();
        let decomposed = if compact.chars().count() < self.min_decomposed_len {
            PatternInsert::TooShort
        } else if compact == entry.word {
            PatternInsert::SameAsSurface
        } else {
            self.push(compact, &entry.word, MatchKind::Decomposed)
        };

        InsertOutcome {
            word: entry.word.clone(),
            surface,
            decomposed,
        }
    }

    fn count(&self, kind: MatchKind) -> usize {
        self.patterns.iter().filter(|p| p.kind == kind).count()
    }

    fn compile(self) -> Result<CompiledLexicon> {
        if self.patterns.is_empty() {
            return Err(Error::EmptyLexicon);
        }

        let matcher = AhoCorasick::builder()
            .match_kind(AcMatchKind::Standard)
            .build(self.patterns.iter().map(|p| p.text.as_str()))
            .map_err(|e| Error::internal(format!("Failed to build lexicon matcher: {}", e)))?;

        Ok(CompiledLexicon {
            matcher,
            set: self,
        })
    }
}

/// A compiled, queryable matcher and the patterns it was built from
#[derive(Debug)]
pub struct CompiledLexicon {
    matcher: AhoCorasick,
    set: PatternSet,
}

impl CompiledLexicon {
    /// Every (overlapping) pattern occurrence, ordered by end position
    pub fn find_iter<'a>(&'a self, text: &'a str) -> impl Iterator<Item = LexiconMatch> + 'a {
        self.matcher.find_overlapping_iter(text).map(move |m| {
            let pattern = &self.set.patterns[m.pattern().as_usize()];
            LexiconMatch {
                start: m.start(),
                end: m.end(),
                pattern: pattern.text.clone(),
                word: pattern.word.clone(),
                kind: pattern.kind,
            }
        })
    }

    /// Collect all occurrences in `text`
    pub fn scan(&self, text: &str) -> Vec<LexiconMatch> {
        self.find_iter(text).collect()
    }

    /// Registered patterns in insertion order
    pub fn patterns(&self) -> &[LexiconPattern] {
        &self.set.patterns
    }

    /// Whether a pattern with exactly this text exists
    pub fn contains_pattern(&self, text: &str) -> bool {
        self.set.texts.contains(text)
    }

    pub fn pattern_count(&self) -> usize {
        self.set.patterns.len()
    }

    pub fn word_count(&self) -> usize {
        self.set.words.len()
    }

    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            words: self.word_count(),
            surface_patterns: self.set.count(MatchKind::Surface),
            decomposed_patterns: self.set.count(MatchKind::Decomposed),
        }
    }
}

/// Process-wide lexicon matcher with atomic swaps and a single writer
pub struct LexiconAutomaton {
    current: RwLock<Option<Arc<CompiledLexicon>>>,
    rebuild: Mutex<()>,
    min_decomposed_len: usize,
}

impl LexiconAutomaton {
    /// Create an unbuilt automaton
    pub fn new() -> Self {
        Self::with_min_decomposed_len(MIN_DECOMPOSED_LEN)
    }

    /// Create an unbuilt automaton with a custom decomposed-pattern threshold
    pub fn with_min_decomposed_len(min_decomposed_len: usize) -> Self {
        Self {
            current: RwLock::new(None),
            rebuild: Mutex::new(()),
            min_decomposed_len,
        }
    }

    /// Create an unbuilt automaton from configuration
    pub fn from_config(config: &LexiconConfig) -> Self {
        Self::with_min_decomposed_len(config.min_decomposed_len)
    }

    /// Rebuild from a snapshot of every lexicon row.
    ///
    /// An empty snapshot disables the matcher and returns `EmptyLexicon`.
    pub fn build(&self, words: &[ForbiddenWord]) -> Result<BuildSummary> {
        let _writer = self.rebuild.lock();

        if words.is_empty() {
            *self.current.write() = None;
            return Err(Error::EmptyLexicon);
        }

        let mut set = PatternSet::new(self.min_decomposed_len);
        for word in words {
            set.add(word);
        }

        let compiled = set.compile()?;
        let summary = compiled.summary();
        *self.current.write() = Some(Arc::new(compiled));

        metrics::counter!("wordguard_lexicon_rebuilds_total").increment(1);
        info!(
            "Lexicon built: {} words, {} surface patterns, {} decomposed patterns",
            summary.words, summary.surface_patterns, summary.decomposed_patterns
        );

        Ok(summary)
    }

    /// Insert one word and leave the automaton queryable
    pub fn insert(&self, word: &ForbiddenWord) -> Result<InsertOutcome> {
        self.insert_many(std::slice::from_ref(word))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("insert produced no outcome"))
    }

    /// Insert several words, compiling once at the end
    pub fn insert_many(&self, words: &[ForbiddenWord]) -> Result<Vec<InsertOutcome>> {
        let _writer = self.rebuild.lock();

        let previous = self.snapshot();
        let mut set = match &previous {
            Some(compiled) => compiled.set.clone(),
            None => PatternSet::new(self.min_decomposed_len),
        };

        let outcomes: Vec<InsertOutcome> = words.iter().map(|w| set.add(w)).collect();
        for outcome in &outcomes {
            log_outcome(outcome);
        }

        if previous.is_some() && !outcomes.iter().any(InsertOutcome::is_new) {
            return Ok(outcomes);
        }

        let compiled = set.compile()?;
        *self.current.write() = Some(Arc::new(compiled));
        metrics::counter!("wordguard_lexicon_rebuilds_total").increment(1);

        Ok(outcomes)
    }

    /// Remove words and recompile from the remaining patterns.
    ///
    /// Returns `None` when nothing is left (matcher disabled) or when the
    /// automaton was never built.
    pub fn remove(&self, words: &[String]) -> Result<Option<BuildSummary>> {
        let _writer = self.rebuild.lock();

        let Some(previous) = self.snapshot() else {
            return Ok(None);
        };

        let removed: HashSet<&str> = words.iter().map(String::as_str).collect();
        let set = previous.set.without(&removed);

        if set.patterns.is_empty() {
            *self.current.write() = None;
            info!("Last lexicon pattern removed; matcher disabled");
            return Ok(None);
        }

        let compiled = set.compile()?;
        let summary = compiled.summary();
        *self.current.write() = Some(Arc::new(compiled));

        metrics::counter!("wordguard_lexicon_rebuilds_total").increment(1);
        debug!("Removed {} words from lexicon matcher", removed.len());

        Ok(Some(summary))
    }

    /// Drop the compiled matcher
    pub fn clear(&self) {
        let _writer = self.rebuild.lock();
        *self.current.write() = None;
    }

    /// Current compiled matcher, if any
    pub fn snapshot(&self) -> Option<Arc<CompiledLexicon>> {
        self.current.read().clone()
    }

    /// Every pattern occurrence in `text`; empty when unbuilt
    pub fn scan(&self, text: &str) -> Vec<LexiconMatch> {
        self.snapshot()
            .map(|compiled| compiled.scan(text))
            .unwrap_or_default()
    }

    pub fn is_built(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn pattern_count(&self) -> usize {
        self.snapshot().map_or(0, |c| c.pattern_count())
    }

    pub fn word_count(&self) -> usize {
        self.snapshot().map_or(0, |c| c.word_count())
    }
}

impl Default for LexiconAutomaton {
    fn default() -> Self {
        Self::new()
    }
}

fn log_outcome(outcome: &InsertOutcome) {
    match outcome.surface {
        PatternInsert::Added => info!("'{}' registered as surface pattern", outcome.word),
        PatternInsert::AlreadyPresent => debug!("'{}' surface pattern already present", outcome.word),
        other => debug!("'{}' surface pattern skipped ({:?})", outcome.word, other),
    }

    match outcome.decomposed {
        PatternInsert::Added => info!("'{}' registered as decomposed pattern", outcome.word),
        PatternInsert::AlreadyPresent => {
            debug!("'{}' decomposed pattern already present", outcome.word)
        }
        other => debug!("'{}' decomposed pattern skipped ({:?})", outcome.word, other),
    }
}
