//! Forbidden-message detector
//!
//! Raw substring matching over-triggers on forbidden fragments inside longer,
//! unrelated words. A match only counts when it coincides with a content
//! token extracted independently from the message.
//!
//! Matching is case-insensitive: lexicon entries are stored folded and each
//! message is folded once before tokenizing and scanning.

use crate::automaton::LexiconAutomaton;
use crate::decompose::PhoneticDecomposer;
use crate::tokenizer::TokenFilter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use wordguard_core::{MatchKind, Result, Verdict};

/// Result of checking one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub verdict: Verdict,

    /// Canonical word that fired
    pub detected_word: Option<String>,

    /// Pattern class that fired
    pub method: Option<MatchKind>,

    /// Check latency in microseconds
    pub latency_us: u64,

    /// False when the check passed only because no lexicon is loaded
    pub lexicon_available: bool,
}

impl DetectionResult {
    fn pass(latency_us: u64, lexicon_available: bool) -> Self {
        Self {
            verdict: Verdict::Pass,
            detected_word: None,
            method: None,
            latency_us,
            lexicon_available,
        }
    }

    fn blocked(word: String, method: MatchKind, latency_us: u64) -> Self {
        Self {
            verdict: Verdict::Blocked,
            detected_word: Some(word),
            method: Some(method),
            latency_us,
            lexicon_available: true,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict.is_blocked()
    }
}

/// Case folding applied to lexicon entries and to checked messages
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Combines the lexicon automaton with the token filter
pub struct ForbiddenMessageDetector {
    automaton: Arc<LexiconAutomaton>,
    token_filter: TokenFilter,
    decomposer: Arc<dyn PhoneticDecomposer>,
}

impl ForbiddenMessageDetector {
    pub fn new(
        automaton: Arc<LexiconAutomaton>,
        token_filter: TokenFilter,
        decomposer: Arc<dyn PhoneticDecomposer>,
    ) -> Self {
        Self {
            automaton,
            token_filter,
            decomposer,
        }
    }

    /// Check a message against the lexicon
    pub fn check(&self, message: &str) -> Result<DetectionResult> {
        let start = Instant::now();
        metrics::counter!("wordguard_checks_total").increment(1);

        let Some(lexicon) = self.automaton.snapshot() else {
            warn!("Forbidden-word lexicon is not loaded; passing message unchecked");
            metrics::counter!("wordguard_unchecked_total").increment(1);
            return Ok(DetectionResult::pass(elapsed_us(start), false));
        };

        let message = fold_case(message);
        let tokens = self.token_filter.meaningful_tokens(&message)?;

        // Surface patterns against the message as written.
        let surface = lexicon
            .find_iter(&message)
            .filter(|m| m.kind == MatchKind::Surface)
            .find(|m| tokens.contains(&m.pattern));

        if let Some(found) = surface {
            return Ok(self.record_block(found.word, MatchKind::Surface, start));
        }

        // Decomposed patterns against the compact decomposition of the message.
        let decomposed_message = self.decomposer.decompose_compact(&message);
        let decomposed = lexicon
            .find_iter(&decomposed_message)
            .filter(|m| m.kind == MatchKind::Decomposed)
            .find(|m| tokens.contains(&m.word));

        if let Some(found) = decomposed {
            return Ok(self.record_block(found.word, MatchKind::Decomposed, start));
        }

        let latency_us = elapsed_us(start);
        metrics::histogram!("wordguard_check_latency_us").record(latency_us as f64);
        Ok(DetectionResult::pass(latency_us, true))
    }

    fn record_block(&self, word: String, method: MatchKind, start: Instant) -> DetectionResult {
        let latency_us = elapsed_us(start);
        debug!("Message blocked by '{}' ({})", word, method);
        metrics::counter!("wordguard_blocked_total", "method" => method.as_str()).increment(1);
        metrics::histogram!("wordguard_check_latency_us").record(latency_us as f64);
        DetectionResult::blocked(word, method, latency_us)
    }
}

fn elapsed_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LexiconConfig;
    use crate::decompose::HangulDecomposer;
    use crate::tokenizer::{RuleTokenizer, TaggedToken, Tokenizer};
    use wordguard_core::ForbiddenWord;

    /// Tags every whitespace-separated word as a noun
    struct WhitespaceTokenizer;

    impl Tokenizer for WhitespaceTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>> {
            Ok(text
                .split_whitespace()
                .map(|w| TaggedToken::new(w, "NNG"))
                .collect())
        }
    }

    /// Always reports the same tokens, whatever the input
    struct FixedTokenizer(Vec<&'static str>);

    impl Tokenizer for FixedTokenizer {
        fn tokenize(&self, _text: &str) -> Result<Vec<TaggedToken>> {
            Ok(self.0.iter().map(|w| TaggedToken::new(*w, "NNG")).collect())
        }
    }

    fn detector_with(
        tokenizer: Arc<dyn Tokenizer>,
        words: &[&str],
    ) -> (ForbiddenMessageDetector, Arc<LexiconAutomaton>) {
        let decomposer = Arc::new(HangulDecomposer::new());
        let automaton = Arc::new(LexiconAutomaton::new());
        if !words.is_empty() {
            let rows: Vec<_> = words
                .iter()
                .map(|w| fold_case(w))
                .map(|w| ForbiddenWord::new(w.clone(), decomposer.decompose(&w)))
                .collect();
            automaton.build(&rows).unwrap();
        }

        let filter = TokenFilter::from_config(tokenizer, &LexiconConfig::default());
        (
            ForbiddenMessageDetector::new(Arc::clone(&automaton), filter, decomposer),
            automaton,
        )
    }

    #[test]
    fn test_registered_word_is_blocked_by_surface() {
        let (detector, _) = detector_with(Arc::new(WhitespaceTokenizer), &["spam"]);

        let result = detector.check("buy spam now").unwrap();
        assert_eq!(result.verdict, Verdict::Blocked);
        assert_eq!(result.detected_word.as_deref(), Some("spam"));
        assert_eq!(result.method, Some(MatchKind::Surface));
    }

    #[test]
    fn test_fragment_inside_longer_word_passes() {
        let (detector, _) = detector_with(Arc::new(WhitespaceTokenizer), &["ass"]);

        let result = detector.check("a classic passage").unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.lexicon_available);
    }

    #[test]
    fn test_clean_message_passes() {
        let (detector, _) = detector_with(Arc::new(RuleTokenizer::new()), &["바보"]);
        let result = detector.check("좋은 아침입니다").unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.detected_word.is_none());
        assert!(result.method.is_none());
    }

    #[test]
    fn test_particle_is_peeled_before_membership() {
        let (detector, _) = detector_with(Arc::new(RuleTokenizer::new()), &["바보"]);
        let result = detector.check("이 바보야").unwrap();
        assert_eq!(result.verdict, Verdict::Blocked);
        assert_eq!(result.method, Some(MatchKind::Surface));
    }

    #[test]
    fn test_word_ending_in_particle_syllable_is_blocked() {
        let (detector, _) = detector_with(Arc::new(RuleTokenizer::new()), &["멍청이", "바보"]);

        let alone = detector.check("멍청이").unwrap();
        assert_eq!(alone.verdict, Verdict::Blocked);
        assert_eq!(alone.detected_word.as_deref(), Some("멍청이"));

        assert!(detector.check("이 멍청이야!").unwrap().is_blocked());
        assert!(detector.check("바보가 왔다").unwrap().is_blocked());
        assert!(detector.check("바보는").unwrap().is_blocked());
    }

    #[test]
    fn test_latin_words_match_regardless_of_case() {
        let (detector, _) = detector_with(Arc::new(RuleTokenizer::new()), &["Spam"]);

        for message in ["Spam", "spam", "buy SPAM now"] {
            let result = detector.check(message).unwrap();
            assert_eq!(result.verdict, Verdict::Blocked, "{}", message);
            assert_eq!(result.detected_word.as_deref(), Some("spam"));
        }
        assert_eq!(detector.check("spammer").unwrap().verdict, Verdict::Pass);
    }

    #[test]
    fn test_rule_tokenizer_still_ignores_embedded_fragments() {
        let (detector, _) = detector_with(Arc::new(RuleTokenizer::new()), &["바보"]);
        let result = detector.check("바보스럽지않은하루").unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn test_punctuation_spaced_word_is_caught_by_decomposition() {
        let (detector, _) = detector_with(Arc::new(FixedTokenizer(vec!["바보"])), &["바보"]);

        let result = detector.check("바.보").unwrap();
        assert_eq!(result.verdict, Verdict::Blocked);
        assert_eq!(result.method, Some(MatchKind::Decomposed));
    }

    #[test]
    fn test_empty_lexicon_passes_with_warning_flag() {
        let (detector, _) = detector_with(Arc::new(WhitespaceTokenizer), &[]);
        let result = detector.check("anything at all").unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(!result.lexicon_available);
    }

    #[test]
    fn test_spaced_out_word_is_caught_by_decomposition() {
        // The analyzer recovers "바보" from the spaced-out spelling.
        let (detector, _) = detector_with(Arc::new(FixedTokenizer(vec!["바보"])), &["바보"]);

        let result = detector.check("바 보").unwrap();
        assert_eq!(result.verdict, Verdict::Blocked);
        assert_eq!(result.detected_word.as_deref(), Some("바보"));
        assert_eq!(result.method, Some(MatchKind::Decomposed));
    }

    #[test]
    fn test_bare_jamo_spelling_is_caught_by_decomposition() {
        let (detector, _) = detector_with(Arc::new(FixedTokenizer(vec!["바보"])), &["바보"]);

        let result = detector.check("ㅂㅏㅂㅗ").unwrap();
        assert_eq!(result.method, Some(MatchKind::Decomposed));
    }

    #[test]
    fn test_decomposed_match_requires_token_membership() {
        let (detector, _) = detector_with(Arc::new(FixedTokenizer(vec!["바"])), &["바보"]);
        let result = detector.check("바 보").unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
    }

    #[test]
    fn test_surface_wins_over_decomposed() {
        let (detector, _) = detector_with(Arc::new(WhitespaceTokenizer), &["바보"]);
        let result = detector.check("바보").unwrap();
        assert_eq!(result.method, Some(MatchKind::Surface));
    }

    #[test]
    fn test_first_accepted_surface_match_in_scan_order() {
        let (detector, _) = detector_with(Arc::new(WhitespaceTokenizer), &["alpha", "beta"]);
        let result = detector.check("beta then alpha").unwrap();
        assert_eq!(result.detected_word.as_deref(), Some("beta"));
    }

    #[test]
    fn test_tokenizer_failure_propagates() {
        struct Broken;
        impl Tokenizer for Broken {
            fn tokenize(&self, _text: &str) -> Result<Vec<TaggedToken>> {
                Err(wordguard_core::Error::tokenizer("dictionary missing"))
            }
        }

        let (detector, _) = detector_with(Arc::new(Broken), &["spam"]);
        assert!(detector.check("spam").is_err());
    }
}
