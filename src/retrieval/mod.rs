// Retrieval coordinator
// Owns the corpus/index pair and rebuilds it from the document folder

pub mod index;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::documents::{self, Document};
use crate::embeddings::{Chunk, ChunkingConfig, Embedder, chunk_documents};
use crate::{CampusError, Result};

pub use index::{IndexError, SearchHit, VectorIndex};

const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// A passage returned by a query, with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub source_order: usize,
}

/// What queries currently see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Ready { chunks: usize },
}

/// Sizes of the live corpus and index, read together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub chunks: usize,
    pub vectors: usize,
    pub dimension: Option<usize>,
}

/// Outcome of a rebuild. A rebuild never fails; problems are counted here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub documents_seen: usize,
    pub documents_extracted: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    /// Passages now searchable
    pub chunks: usize,
    /// Why the store ended up empty despite having text, if it did
    pub degraded: Option<String>,
}

impl BuildReport {
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.chunks > 0
    }
}

#[derive(Debug, Default)]
struct CorpusIndex {
    corpus: Vec<Chunk>,
    index: VectorIndex,
}

/// The process-wide corpus and vector index.
///
/// Queries read the pair under a shared lock. Rebuilds extract and embed
/// outside that lock and swap the finished pair in under the write lock, so a
/// query sees either the old pair or the new one. Rebuilds and clears are
/// serialized with each other.
pub struct RetrievalStore {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    embed_batch_size: usize,
    state: RwLock<CorpusIndex>,
    rebuild: Mutex<()>,
}

impl RetrievalStore {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            state: RwLock::new(CorpusIndex::default()),
            rebuild: Mutex::new(()),
        }
    }

    #[inline]
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(embedder, config.chunking.clone())
            .with_embed_batch_size(config.ollama.batch_size as usize)
    }

    #[inline]
    #[must_use]
    pub fn with_embed_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size.max(1);
        self
    }

    /// Rebuild from every supported document in `folder`
    #[inline]
    pub async fn build_index(&self, folder: &Path) -> BuildReport {
        let _rebuild = self.rebuild.lock().await;

        let owned = folder.to_path_buf();
        let scanned = tokio::task::spawn_blocking(move || documents::scan(&owned))
            .await
            .map_err(|e| CampusError::Other(anyhow::anyhow!("Document scan task failed: {e}")))
            .and_then(|scan| scan);

        match scanned {
            Ok(scan) => {
                let report = BuildReport {
                    documents_seen: scan.documents.len() + scan.skipped.len(),
                    documents_skipped: scan.skipped.len(),
                    ..BuildReport::default()
                };
                self.rebuild_locked(scan.documents, report).await
            }
            Err(e) => {
                warn!("Could not read {}: {}", folder.display(), e);
                self.swap(CorpusIndex::default()).await;
                BuildReport {
                    degraded: Some(e.to_string()),
                    ..BuildReport::default()
                }
            }
        }
    }

    /// Rebuild from documents already in memory
    #[inline]
    pub async fn build_from_documents(&self, documents: Vec<Document>) -> BuildReport {
        let _rebuild = self.rebuild.lock().await;

        let report = BuildReport {
            documents_seen: documents.len(),
            ..BuildReport::default()
        };
        self.rebuild_locked(documents, report).await
    }

    async fn rebuild_locked(&self, documents: Vec<Document>, mut report: BuildReport) -> BuildReport {
        let (texts, failed) = extract_each(documents).await;
        report.documents_extracted = texts.len();
        report.documents_failed = failed;

        let chunking = self.chunking.clone();
        let chunks = match tokio::task::spawn_blocking(move || {
            chunk_documents(texts.iter().map(String::as_str), &chunking)
        })
        .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Chunking task failed: {}", e);
                self.swap(CorpusIndex::default()).await;
                report.degraded = Some(format!("chunking task failed: {e}"));
                return report;
            }
        };

        if chunks.is_empty() {
            info!("No usable text extracted, index is empty");
            self.swap(CorpusIndex::default()).await;
            return report;
        }

        let embedder = Arc::clone(&self.embedder);
        let batch_size = self.embed_batch_size;
        let embedded = tokio::task::spawn_blocking(move || {
            let index = embed_chunks(embedder.as_ref(), &chunks, batch_size)?;
            Ok::<_, CampusError>(CorpusIndex {
                corpus: chunks,
                index,
            })
        })
        .await
        .map_err(|e| CampusError::Other(anyhow::anyhow!("Embedding task failed: {e}")))
        .and_then(|built| built);

        match embedded {
            Ok(built) => {
                report.chunks = built.corpus.len();
                self.swap(built).await;
                info!(
                    "Indexed {} passages from {} documents",
                    report.chunks, report.documents_extracted
                );
            }
            Err(e) => {
                warn!("Embedding failed, index is empty: {}", e);
                self.swap(CorpusIndex::default()).await;
                report.degraded = Some(e.to_string());
            }
        }

        report
    }

    async fn swap(&self, next: CorpusIndex) {
        *self.state.write().await = next;
    }

    /// Texts of the `k` passages most similar to `query`, best first
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        self.retrieve_scored(query, k)
            .await
            .into_iter()
            .map(|chunk| chunk.text)
            .collect()
    }

    /// Like [`retrieve`](Self::retrieve) but with similarity scores
    #[inline]
    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Vec<RetrievedChunk> {
        if k == 0 || self.state.read().await.corpus.is_empty() {
            return Vec::new();
        }

        let embedder = Arc::clone(&self.embedder);
        let owned = query.to_string();
        let vector = match tokio::task::spawn_blocking(move || embedder.embed_one(&owned)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                warn!("Could not embed query: {}", e);
                return Vec::new();
            }
            Err(e) => {
                warn!("Query embedding task failed: {}", e);
                return Vec::new();
            }
        };

        let state = self.state.read().await;

        if state.index.dimension().is_some_and(|dim| dim != vector.len()) {
            warn!(
                "Query has {} dimensions but the index has {:?}, no matches",
                vector.len(),
                state.index.dimension()
            );
            return Vec::new();
        }

        let results: Vec<RetrievedChunk> = state
            .index
            .search(&vector, k)
            .into_iter()
            .filter_map(|hit| {
                state.corpus.get(hit.index).map(|chunk| RetrievedChunk {
                    text: chunk.text.clone(),
                    score: hit.score,
                    source_order: chunk.source_order,
                })
            })
            .collect();

        debug!("Retrieved {} passages for query", results.len());
        results
    }

    /// Drop the corpus and index. Safe to call repeatedly.
    #[inline]
    pub async fn clear(&self) {
        let _rebuild = self.rebuild.lock().await;
        self.swap(CorpusIndex::default()).await;
        info!("Retrieval index cleared");
    }

    #[inline]
    pub async fn state(&self) -> StoreState {
        let state = self.state.read().await;
        if state.corpus.is_empty() {
            StoreState::Empty
        } else {
            StoreState::Ready {
                chunks: state.corpus.len(),
            }
        }
    }

    #[inline]
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            chunks: state.corpus.len(),
            vectors: state.index.len(),
            dimension: state.index.dimension(),
        }
    }

    /// Whether a rebuild or clear is in progress
    #[inline]
    pub fn is_rebuilding(&self) -> bool {
        self.rebuild.try_lock().is_err()
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

/// Extract every document on its own blocking task so a parser panic only
/// loses that document. Returns the non-empty texts and the failure count.
async fn extract_each(batch: Vec<Document>) -> (Vec<String>, usize) {
    let mut texts = Vec::with_capacity(batch.len());
    let mut failed = 0;

    for document in batch {
        let name = document.name.clone();
        match tokio::task::spawn_blocking(move || documents::extract(&document)).await {
            Ok(Ok(text)) if text.trim().is_empty() => {
                info!("No text found in {}", name);
            }
            Ok(Ok(text)) => texts.push(text),
            Ok(Err(e)) => {
                warn!("Error reading {}: {}", name, e);
                failed += 1;
            }
            Err(e) => {
                warn!("Extraction of {} aborted: {}", name, e);
                failed += 1;
            }
        }
    }

    (texts, failed)
}

fn embed_chunks(embedder: &dyn Embedder, chunks: &[Chunk], batch_size: usize) -> Result<VectorIndex> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(chunks.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding passages")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let embedded = embedder.embed(&texts)?;

        if embedded.len() != texts.len() {
            bar.abandon();
            return Err(CampusError::Embedding(format!(
                "{} returned {} vectors for {} passages",
                embedder.name(),
                embedded.len(),
                texts.len()
            )));
        }

        vectors.extend(embedded);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    VectorIndex::build(vectors).map_err(|e| CampusError::Index(e.to_string()))
}
