use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::extractor::DocumentExtractor;
use tempfile::TempDir;

/// Embeds text as the share of 'a' and 'b' characters
#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
    fail: bool,
    drop_last: bool,
}

impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        "test-embedder"
    }

    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::QuotaExceeded);
        }
        let len = text.chars().count().max(1) as f32;
        let a = text.chars().filter(|&c| c == 'a').count() as f32;
        let b = text.chars().filter(|&c| c == 'b').count() as f32;
        Ok(vec![a / len, b / len])
    }

    fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = texts
            .iter()
            .map(|text| self.embed(text))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }
}

#[derive(Default)]
struct CountingExtractor {
    calls: AtomicUsize,
}

impl TextExtractor for CountingExtractor {
    fn extract(&self, document: &SourceDocument) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DocumentExtractor.extract(document)
    }
}

fn two_documents() -> Vec<SourceDocument> {
    vec![
        SourceDocument::new("a.txt", "a".repeat(6000)),
        SourceDocument::new("b.txt", "b".repeat(6000)),
    ]
}

fn create_test_indexer(
    embedder: CountingEmbedder,
) -> (Indexer, Arc<CountingExtractor>, Arc<CountingEmbedder>, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let extractor = Arc::new(CountingExtractor::default());
    let embedder = Arc::new(embedder);
    let indexer = Indexer::new(
        extractor.clone(),
        embedder.clone(),
        IndexStore::new(temp_dir.path()),
        ChunkingConfig::default(),
    );
    (indexer, extractor, embedder, temp_dir)
}

#[test]
fn starts_idle() {
    let (indexer, _, _, _temp_dir) = create_test_indexer(CountingEmbedder::default());
    assert_eq!(indexer.state(), IngestionState::Idle);
}

#[test]
fn no_documents_fails_without_calling_collaborators() {
    let (mut indexer, extractor, embedder, _temp_dir) =
        create_test_indexer(CountingEmbedder::default());

    let result = indexer.process(&[]);

    assert!(matches!(result, Err(QaError::NoDocuments)));
    assert_eq!(
        indexer.state(),
        IngestionState::Failed(ErrorKind::NoDocuments)
    );
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(!indexer.store().exists());
}

#[test]
fn process_persists_index() {
    let (mut indexer, extractor, embedder, _temp_dir) =
        create_test_indexer(CountingEmbedder::default());

    let report = indexer
        .process(&two_documents())
        .expect("process should succeed");

    assert_eq!(indexer.state(), IngestionState::Indexed);
    assert_eq!(report.documents, 2);
    assert_eq!(report.characters, 12_000);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.dimension, 2);
    assert_eq!(report.location, indexer.store().location());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

    let index = indexer.store().load(2).expect("index should load");
    assert_eq!(index.len(), 3);
    let manifest = indexer
        .store()
        .read_manifest()
        .expect("manifest should be readable");
    assert_eq!(manifest.embedding_model, "test-embedder");
}

#[test]
fn embedding_failure_writes_nothing() {
    let (mut indexer, _, _, _temp_dir) = create_test_indexer(CountingEmbedder {
        fail: true,
        ..CountingEmbedder::default()
    });

    let result = indexer.process(&two_documents());

    assert!(matches!(
        result,
        Err(QaError::Provider(ProviderError::QuotaExceeded))
    ));
    assert_eq!(indexer.state(), IngestionState::Failed(ErrorKind::Provider));
    assert!(!indexer.store().exists());
}

#[test]
fn embedding_failure_keeps_previous_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());

    let mut first = Indexer::new(
        Arc::new(DocumentExtractor),
        Arc::new(CountingEmbedder::default()),
        store.clone(),
        ChunkingConfig::default(),
    );
    first
        .process(&two_documents())
        .expect("first process should succeed");

    let mut failing = Indexer::new(
        Arc::new(DocumentExtractor),
        Arc::new(CountingEmbedder {
            fail: true,
            ..CountingEmbedder::default()
        }),
        store.clone(),
        ChunkingConfig::default(),
    );
    assert!(failing.process(&two_documents()).is_err());

    assert_eq!(store.load(2).expect("old index should load").len(), 3);
}

#[test]
fn missing_embeddings_are_rejected() {
    let (mut indexer, _, _, _temp_dir) = create_test_indexer(CountingEmbedder {
        drop_last: true,
        ..CountingEmbedder::default()
    });

    let result = indexer.process(&two_documents());

    assert!(matches!(
        result,
        Err(QaError::Provider(ProviderError::InvalidResponse(_)))
    ));
    assert!(!indexer.store().exists());
}

#[test]
fn extraction_failure_skips_embedding() {
    let (mut indexer, _, embedder, _temp_dir) = create_test_indexer(CountingEmbedder::default());

    let documents = vec![SourceDocument::new("binary.bin", vec![0xff, 0xfe])];
    let result = indexer.process(&documents);

    assert!(matches!(result, Err(QaError::Extraction { .. })));
    assert_eq!(
        indexer.state(),
        IngestionState::Failed(ErrorKind::Extraction)
    );
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn documents_without_text_are_an_empty_index() {
    let (mut indexer, _, embedder, _temp_dir) = create_test_indexer(CountingEmbedder::default());

    let result = indexer.process(&[SourceDocument::new("empty.txt", "")]);

    assert!(matches!(result, Err(QaError::EmptyIndex)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

    let result = indexer.process(&[SourceDocument::new("scan.txt", "\n\n  \n\n")]);

    assert!(matches!(result, Err(QaError::EmptyIndex)));
    assert_eq!(indexer.state(), IngestionState::Failed(ErrorKind::EmptyIndex));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(!indexer.store().exists());
}

#[test]
fn whitespace_documents_keep_previous_index() {
    let (mut indexer, _, embedder, _temp_dir) = create_test_indexer(CountingEmbedder::default());
    indexer
        .process(&two_documents())
        .expect("first process should succeed");
    let calls_before = embedder.calls.load(Ordering::SeqCst);

    let result = indexer.process(&[
        SourceDocument::new("scan-1.txt", "  \n"),
        SourceDocument::new("scan-2.txt", "\t\n\n"),
    ]);

    assert!(matches!(result, Err(QaError::EmptyIndex)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_before);
    let index = indexer.store().load(2).expect("previous index should load");
    assert_eq!(index.len(), 3);
}

#[test]
fn reprocessing_replaces_index() {
    let (mut indexer, _, _, _temp_dir) = create_test_indexer(CountingEmbedder::default());

    indexer
        .process(&two_documents())
        .expect("first process should succeed");
    let report = indexer
        .process(&[SourceDocument::new("short.txt", "a short note")])
        .expect("second process should succeed");

    assert_eq!(report.chunks, 1);
    let index = indexer.store().load(2).expect("index should load");
    assert_eq!(index.len(), 1);
    assert_eq!(index.entries()[0].text, "a short note");
}

#[test]
fn state_display() {
    assert_eq!(IngestionState::Embedding.to_string(), "embedding");
    assert_eq!(
        IngestionState::Failed(ErrorKind::NoDocuments).to_string(),
        "failed (NoDocuments)"
    );
}
