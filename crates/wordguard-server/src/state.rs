//! Application state shared across requests

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};
use wordguard_lexicon::{HangulDecomposer, LexiconService, RuleTokenizer};
use wordguard_similarity::SimilarityIndex;

use crate::config::ServerConfig;
use crate::store::SqliteStore;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Forbidden-word lexicon and detector
    pub lexicon: Arc<LexiconService>,

    /// Per-user sensitive phrases
    pub similarity: Arc<SimilarityIndex>,

    /// Database handle for health checks
    pub store: Arc<SqliteStore>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Wire services over one SQLite store
    pub fn new(
        config: &ServerConfig,
        store: Arc<SqliteStore>,
        embedder: Arc<dyn wordguard_similarity::EmbeddingProvider>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let lexicon = LexiconService::new(
            store.clone(),
            Arc::new(RuleTokenizer::new()),
            Arc::new(HangulDecomposer::new()),
            &config.lexicon,
        );
        let similarity = SimilarityIndex::new(store.clone(), embedder, &config.similarity);

        Self {
            lexicon: Arc::new(lexicon),
            similarity: Arc::new(similarity),
            store,
            metrics_handle,
        }
    }

    /// Initialize application state from configuration: open the database,
    /// load the embedder and build the lexicon matcher
    pub async fn from_config(
        config: &ServerConfig,
        metrics_handle: PrometheusHandle,
    ) -> anyhow::Result<Self> {
        info!("Initializing application state");

        let store = Arc::new(SqliteStore::connect(&config.database_url, config.max_connections).await?);

        let embedder = config.similarity.embedder.build()?;
        info!(
            "Embedding model: {} (dimension {})",
            embedder.model_id(),
            embedder.dimension()
        );

        let state = Self::new(config, store, embedder, metrics_handle);

        match state.lexicon.reload().await? {
            Some(summary) => info!(
                "Lexicon loaded: {} words, {} surface and {} decomposed patterns",
                summary.words, summary.surface_patterns, summary.decomposed_patterns
            ),
            None => warn!("Starting with an empty lexicon; messages pass unchecked"),
        }

        Ok(state)
    }
}
