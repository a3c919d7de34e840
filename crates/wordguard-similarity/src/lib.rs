//! WordGuard Similarity
//!
//! Per-user sensitive phrases matched by meaning rather than spelling.
//!
//! Each phrase is embedded once per model and shared between users through a
//! reference-counted link table. Checks embed the incoming message and report
//! the closest registered phrase with its cosine similarity.

#[cfg(feature = "ml-models")]
pub mod bert;
pub mod config;
pub mod embedding;
pub mod index;
pub mod store;

#[cfg(feature = "ml-models")]
pub use bert::BertEmbedder;
pub use config::{EmbedderSpec, SimilarityConfig, DEFAULT_THRESHOLD};
pub use embedding::{decode_embedding, encode_embedding, EmbeddingProvider, HashingEmbedder};
pub use index::{
    cosine_similarity, RemoveAllReport, Removal, SensitiveRegistration, SimilarityCheck,
    SimilarityIndex,
};
pub use store::{InMemorySensitiveWordStore, SensitiveWordStore, Unlink, UnlinkedWord};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::embedding::{EmbeddingProvider, HashingEmbedder};
    pub use crate::index::{SimilarityCheck, SimilarityIndex};
    pub use crate::store::{InMemorySensitiveWordStore, SensitiveWordStore};
}
