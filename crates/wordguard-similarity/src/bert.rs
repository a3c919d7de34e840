//! BERT sentence embeddings on Candle
//!
//! Runs the encoder and mean-pools the last hidden state over the attended
//! tokens, the pooling used by sentence-transformers models. Inference runs
//! on the blocking thread pool so request workers stay free.

use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;
use wordguard_core::{Error, Result};

const MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

/// Loaded weights and tokenizer, shared with inference tasks
struct BertRuntime {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_length: usize,
}

/// Mean-pooled BERT embedder
pub struct BertEmbedder {
    runtime: Arc<BertRuntime>,
    model_id: String,
    dimension: usize,
}

impl std::fmt::Debug for BertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEmbedder")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("max_length", &self.runtime.max_length)
            .finish()
    }
}

impl BertEmbedder {
    /// Load from a directory holding `config.json`, `tokenizer.json` and
    /// `model.safetensors`
    pub fn from_dir(dir: &Path, max_length: usize, device: &str) -> Result<Self> {
        let model_id = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::config(format!("invalid model directory: {}", dir.display())))?;

        Self::load(
            &dir.join("config.json"),
            &dir.join("tokenizer.json"),
            &dir.join("model.safetensors"),
            model_id,
            max_length,
            device,
        )
    }

    /// Download (or reuse the cached copy of) a Hub repository and load it
    pub fn from_hub(repo_id: &str, revision: &str, max_length: usize, device: &str) -> Result<Self> {
        info!("Fetching embedding model {} @ {}", repo_id, revision);

        let mut builder = ApiBuilder::new();
        if let Some(cache) = dirs::cache_dir() {
            builder = builder.with_cache_dir(cache.join("wordguard").join("models"));
        }
        let api = builder
            .build()
            .map_err(|e| Error::embedding(format!("Failed to initialize HuggingFace API: {}", e)))?;

        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let mut paths: Vec<PathBuf> = Vec::with_capacity(MODEL_FILES.len());
        for file in MODEL_FILES {
            let path = repo
                .get(file)
                .map_err(|e| Error::embedding(format!("Failed to download {}: {}", file, e)))?;
            paths.push(path);
        }

        Self::load(
            &paths[0],
            &paths[1],
            &paths[2],
            repo_id.to_string(),
            max_length,
            device,
        )
    }

    fn load(
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        model_id: String,
        max_length: usize,
        device: &str,
    ) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;

        let raw_config = std::fs::read_to_string(config_path)?;
        let bert_config: BertConfig = serde_json::from_str(&raw_config)?;
        let dimension = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::config("model config has no hidden_size"))?
            as usize;

        let device = match device {
            "cuda" => Device::new_cuda(0)
                .map_err(|e| Error::embedding(format!("Failed to initialize CUDA: {}", e)))?,
            "mps" => Device::new_metal(0)
                .map_err(|e| Error::embedding(format!("Failed to initialize Metal: {}", e)))?,
            _ => Device::Cpu,
        };

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)
                .map_err(|e| Error::embedding(format!("Failed to load weights: {}", e)))?
        };
        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| Error::embedding(format!("Failed to load BERT model: {}", e)))?;

        info!("Loaded embedding model {} (dimension {})", model_id, dimension);

        Ok(Self {
            runtime: Arc::new(BertRuntime {
                model,
                tokenizer,
                device,
                max_length,
            }),
            model_id,
            dimension,
        })
    }
}

impl BertRuntime {
    fn encode(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| candle_core::Error::Msg(format!("Tokenization failed: {}", e)))?;

        let len = encoding.get_ids().len().min(self.max_length);
        let input_ids = Tensor::new(&encoding.get_ids()[..len], &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(&encoding.get_type_ids()[..len], &self.device)?.unsqueeze(0)?;
        let mask = Tensor::new(&encoding.get_attention_mask()[..len], &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&input_ids, &type_ids, Some(&mask))?;

        // Padding tokens must not dilute the mean.
        let mask = mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        pooled.squeeze(0)?.to_vec1::<f32>()
    }
}

#[async_trait]
impl EmbeddingProvider for BertEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let runtime = Arc::clone(&self.runtime);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || runtime.encode(&text))
            .await
            .map_err(|e| Error::embedding(format!("{} inference task failed: {}", self.model_id, e)))?
            .map_err(|e| Error::embedding(format!("{} inference failed: {}", self.model_id, e)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_can_move_to_blocking_pool() {
        fn assert_shareable<T: Send + Sync + 'static>() {}
        assert_shareable::<Arc<BertRuntime>>();
    }

    #[test]
    fn test_missing_directory_fails_cleanly() {
        let dir = std::env::temp_dir().join("wordguard-no-such-model");
        assert!(BertEmbedder::from_dir(&dir, 128, "cpu").is_err());
    }
}
