//! Similarity index configuration and embedder selection

use crate::embedding::{EmbeddingProvider, HashingEmbedder, DEFAULT_HASHING_DIM};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use wordguard_core::{Error, Result};

/// Threshold applied when a similarity check does not name one
pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Similarity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Threshold used by checks that omit one
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    /// Which embedding provider to run
    #[serde(default)]
    pub embedder: EmbedderSpec,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            embedder: EmbedderSpec::default(),
        }
    }
}

impl SimilarityConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Reject thresholds outside the cosine range
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.default_threshold) {
            return Err(Error::config(format!(
                "default_threshold must be within [-1, 1], got {}",
                self.default_threshold
            )));
        }
        Ok(())
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbedderSpec {
    /// Offline character n-gram hashing
    Hashing {
        #[serde(default = "default_dimension")]
        dimension: usize,
    },

    /// BERT sentence embeddings (mean pooled), from a local directory or the
    /// Hugging Face Hub
    Bert {
        #[serde(default)]
        model_dir: Option<PathBuf>,
        #[serde(default)]
        repo_id: Option<String>,
        #[serde(default = "default_revision")]
        revision: String,
        #[serde(default = "default_max_length")]
        max_length: usize,
        #[serde(default = "default_device")]
        device: String,
    },
}

impl Default for EmbedderSpec {
    fn default() -> Self {
        Self::Hashing {
            dimension: default_dimension(),
        }
    }
}

impl EmbedderSpec {
    /// Instantiate the configured provider
    pub fn build(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self {
            Self::Hashing { dimension } => Ok(Arc::new(HashingEmbedder::new(*dimension)?)),
            Self::Bert {
                model_dir,
                repo_id,
                revision,
                max_length,
                device,
            } => build_bert(model_dir.as_ref(), repo_id.as_deref(), revision, *max_length, device),
        }
    }
}

#[cfg(feature = "ml-models")]
fn build_bert(
    model_dir: Option<&PathBuf>,
    repo_id: Option<&str>,
    revision: &str,
    max_length: usize,
    device: &str,
) -> Result<Arc<dyn EmbeddingProvider>> {
    use crate::bert::BertEmbedder;

    let embedder = match (model_dir, repo_id) {
        (Some(dir), _) => BertEmbedder::from_dir(dir, max_length, device)?,
        (None, Some(repo)) => BertEmbedder::from_hub(repo, revision, max_length, device)?,
        (None, None) => {
            return Err(Error::config(
                "bert embedder needs either model_dir or repo_id",
            ))
        }
    };

    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "ml-models"))]
fn build_bert(
    _model_dir: Option<&PathBuf>,
    _repo_id: Option<&str>,
    _revision: &str,
    _max_length: usize,
    _device: &str,
) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(Error::config("bert embedder requires the 'ml-models' feature"))
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_dimension() -> usize {
    DEFAULT_HASHING_DIM
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_max_length() -> usize {
    512
}

fn default_device() -> String {
    "cpu".to_string()
}
