//! Configuration for the lexicon matcher and token filter

use serde::{Deserialize, Serialize};

/// Minimum length (in characters, separators stripped) of a decomposed pattern
pub const MIN_DECOMPOSED_LEN: usize = 3;

/// Lexicon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Part-of-speech tags treated as content words
    #[serde(default = "default_allowed_tags")]
    pub allowed_tags: Vec<String>,

    /// Shortest decomposed form that gets its own pattern
    #[serde(default = "default_min_decomposed_len")]
    pub min_decomposed_len: usize,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            allowed_tags: default_allowed_tags(),
            min_decomposed_len: default_min_decomposed_len(),
        }
    }
}

impl LexiconConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

// General noun, proper noun, verb, descriptive, root, interjection.
fn default_allowed_tags() -> Vec<String> {
    ["NNG", "NNP", "VV", "VA", "XR", "IC"]
        .iter()
        .map(|tag| tag.to_string())
        .collect()
}

fn default_min_decomposed_len() -> usize {
    MIN_DECOMPOSED_LEN
}
