// Embeddings module
// Sentence chunking plus the pluggable backends that turn text into vectors

pub mod chunking;
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, EmbedderKind};
use crate::{CampusError, Result};

pub use chunking::{Chunk, ChunkingConfig, chunk_documents, chunk_text, split_sentences};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic and return vectors of the same
/// dimension for the life of the process. The vector index ranks by cosine
/// similarity, so magnitudes do not matter.
pub trait Embedder: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Dimension of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| CampusError::Embedding(format!("{} returned no vector", self.name())))
    }
}

/// Build the embedder selected in the configuration
#[inline]
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.retrieval.embedder {
        EmbedderKind::Ollama => Arc::new(
            OllamaClient::new(config)
                .map_err(|e| CampusError::Config(format!("Failed to create Ollama client: {e:#}")))?,
        ),
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.retrieval.hashing_dimension)),
    };

    info!(
        "Using {} embedder ({} dimensions)",
        embedder.name(),
        embedder.dimension()
    );

    Ok(embedder)
}
