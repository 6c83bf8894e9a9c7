use super::*;
use crate::documents::DocumentFormat;
use crate::embeddings::HashingEmbedder;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn text_document(name: &str, text: &str) -> Document {
    Document::new(name, DocumentFormat::PlainText, text.as_bytes().to_vec())
}

fn hashing_store() -> RetrievalStore {
    RetrievalStore::new(Arc::new(HashingEmbedder::new(512)), ChunkingConfig::default())
}

/// Embeds like the hashing embedder until told to fail or to change dimension
struct FlakyEmbedder {
    inner: HashingEmbedder,
    fail: AtomicBool,
    shrink: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(64),
            fail: AtomicBool::new(false),
            shrink: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Embedder for FlakyEmbedder {
    fn name(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CampusError::Embedding("backend unavailable".to_string()));
        }
        let mut vectors = self.inner.embed(texts)?;
        if self.shrink.load(Ordering::SeqCst) {
            for vector in &mut vectors {
                vector.truncate(8);
            }
        }
        Ok(vectors)
    }
}

#[tokio::test]
async fn starts_empty() {
    let store = hashing_store();

    assert_eq!(store.state().await, StoreState::Empty);
    assert!(store.retrieve("library", 5).await.is_empty());
    assert_eq!(
        store.stats().await,
        StoreStats {
            chunks: 0,
            vectors: 0,
            dimension: None
        }
    );
    assert!(!store.is_rebuilding());
}

#[tokio::test]
async fn builds_from_documents() {
    let store = hashing_store();
    let report = store
        .build_from_documents(vec![
            text_document(
                "library.txt",
                "The central library opens at 8 AM on weekdays. It closes at midnight during exams.",
            ),
            text_document("fees.txt", "Hostel fees must be paid before the first of July."),
        ])
        .await;

    assert_eq!(report.documents_seen, 2);
    assert_eq!(report.documents_extracted, 2);
    assert_eq!(report.chunks, 3);
    assert!(report.degraded.is_none());
    assert!(report.is_ready());
    assert_eq!(store.state().await, StoreState::Ready { chunks: 3 });

    let stats = store.stats().await;
    assert_eq!(stats.chunks, stats.vectors);
    assert_eq!(stats.dimension, Some(512));

    let results = store
        .retrieve_scored("Hostel fees must be paid before the first of July.", 1)
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].text,
        "Hostel fees must be paid before the first of July."
    );
    assert_eq!(results[0].source_order, 2);
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn failed_documents_are_isolated() {
    let store = hashing_store();
    let report = store
        .build_from_documents(vec![
            Document::new("broken.pdf", DocumentFormat::Pdf, b"not a pdf".to_vec()),
            text_document("ok.txt", "The sports complex has an indoor swimming pool."),
        ])
        .await;

    assert_eq!(report.documents_failed, 1);
    assert_eq!(report.documents_extracted, 1);
    assert_eq!(report.chunks, 1);
}

#[tokio::test]
async fn no_usable_text_leaves_store_empty() {
    let store = hashing_store();
    store
        .build_from_documents(vec![text_document(
            "a.txt",
            "The canteen serves breakfast from 7 AM.",
        )])
        .await;

    let report = store
        .build_from_documents(vec![text_document("short.txt", "Page 1.\n\nIndex.")])
        .await;

    assert_eq!(report.chunks, 0);
    assert!(report.degraded.is_none());
    assert_eq!(store.state().await, StoreState::Empty);
}

#[tokio::test]
async fn embedding_failure_degrades_to_empty() {
    let embedder = Arc::new(FlakyEmbedder::new());
    let store = RetrievalStore::new(embedder.clone(), ChunkingConfig::default());

    store
        .build_from_documents(vec![text_document(
            "a.txt",
            "The placement cell is on the second floor.",
        )])
        .await;
    assert_eq!(store.state().await, StoreState::Ready { chunks: 1 });

    embedder.fail.store(true, Ordering::SeqCst);
    let report = store
        .build_from_documents(vec![text_document(
            "b.txt",
            "The placement cell is on the third floor.",
        )])
        .await;

    assert_eq!(report.chunks, 0);
    assert!(report.degraded.is_some());
    assert_eq!(store.state().await, StoreState::Empty);
}

#[tokio::test]
async fn query_embedding_failure_returns_nothing() {
    let embedder = Arc::new(FlakyEmbedder::new());
    let store = RetrievalStore::new(embedder.clone(), ChunkingConfig::default());
    store
        .build_from_documents(vec![text_document(
            "a.txt",
            "Bus passes are issued at the transport office.",
        )])
        .await;

    embedder.fail.store(true, Ordering::SeqCst);

    assert!(store.retrieve("bus pass", 3).await.is_empty());
}

#[tokio::test]
async fn dimension_mismatch_returns_nothing() {
    let embedder = Arc::new(FlakyEmbedder::new());
    let store = RetrievalStore::new(embedder.clone(), ChunkingConfig::default());
    store
        .build_from_documents(vec![text_document(
            "a.txt",
            "Bus passes are issued at the transport office.",
        )])
        .await;

    embedder.shrink.store(true, Ordering::SeqCst);

    assert!(store.retrieve("bus pass", 3).await.is_empty());
}

#[tokio::test]
async fn empty_store_skips_query_embedding() {
    let embedder = Arc::new(FlakyEmbedder::new());
    let store = RetrievalStore::new(embedder.clone(), ChunkingConfig::default());

    assert!(store.retrieve("anything", 5).await.is_empty());
    assert!(
        store
            .build_from_documents(Vec::new())
            .await
            .degraded
            .is_none()
    );
    assert!(store.retrieve("anything", 0).await.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batches_embedding_requests() {
    let embedder = Arc::new(FlakyEmbedder::new());
    let store = RetrievalStore::new(embedder.clone(), ChunkingConfig::default())
        .with_embed_batch_size(2);

    let report = store
        .build_from_documents(vec![text_document(
            "a.txt",
            "The first passage is long enough. The second passage is long enough. \
             The third passage is long enough.",
        )])
        .await;

    assert_eq!(report.chunks, 3);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let store = hashing_store();
    store
        .build_from_documents(vec![text_document(
            "a.txt",
            "The medical centre is open around the clock.",
        )])
        .await;

    store.clear().await;
    let once = store.stats().await;
    store.clear().await;

    assert_eq!(store.stats().await, once);
    assert_eq!(store.state().await, StoreState::Empty);
    assert!(store.retrieve("medical centre", 5).await.is_empty());
}
