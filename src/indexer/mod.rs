// Indexer module
// Ingestion pipeline: documents -> text -> chunks -> embeddings -> persisted index

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunking::{ChunkingConfig, split_text};
use crate::extractor::{SourceDocument, TextExtractor, extract_all};
use crate::index::{IndexEntry, IndexStore, VectorIndex};
use crate::providers::{Embedder, ProviderError};
use crate::{ErrorKind, QaError, Result};

/// Stage of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Idle,
    Extracting,
    Splitting,
    Embedding,
    Persisting,
    Indexed,
    Failed(ErrorKind),
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Extracting => write!(f, "extracting"),
            Self::Splitting => write!(f, "splitting"),
            Self::Embedding => write!(f, "embedding"),
            Self::Persisting => write!(f, "persisting"),
            Self::Indexed => write!(f, "indexed"),
            Self::Failed(kind) => write!(f, "failed ({kind:?})"),
        }
    }
}

/// Summary of a successful ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub documents: usize,
    pub characters: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub location: PathBuf,
}

/// Turns a batch of documents into a persisted vector index
pub struct Indexer {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    store: IndexStore,
    chunking_config: ChunkingConfig,
    state: IngestionState,
}

impl Indexer {
    #[inline]
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        store: IndexStore,
        chunking_config: ChunkingConfig,
    ) -> Self {
        Self {
            extractor,
            embedder,
            store,
            chunking_config,
            state: IngestionState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> IngestionState {
        self.state
    }

    #[inline]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Build and persist an index over `documents`, replacing any previous
    /// index. Nothing is written unless every chunk was embedded.
    #[inline]
    pub fn process(&mut self, documents: &[SourceDocument]) -> Result<IngestionReport> {
        self.state = IngestionState::Idle;

        match self.run(documents) {
            Ok(report) => {
                self.transition(IngestionState::Indexed);
                info!(
                    "Indexed {} chunks from {} documents",
                    report.chunks, report.documents
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(IngestionState::Failed(e.kind()));
                warn!("Ingestion failed: {}", e);
                Err(e)
            }
        }
    }

    fn run(&mut self, documents: &[SourceDocument]) -> Result<IngestionReport> {
        if documents.is_empty() {
            return Err(QaError::NoDocuments);
        }

        self.transition(IngestionState::Extracting);
        let text = extract_all(self.extractor.as_ref(), documents)?;
        let characters = text.chars().count();
        if text.trim().is_empty() {
            return Err(QaError::EmptyIndex);
        }

        self.transition(IngestionState::Splitting);
        let texts: Vec<String> = split_text(&text, &self.chunking_config)?
            .into_iter()
            .map(|chunk| chunk.content)
            .collect();
        if texts.is_empty() {
            return Err(QaError::EmptyIndex);
        }

        self.transition(IngestionState::Embedding);
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }

        let entries = texts
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| IndexEntry { vector, text })
            .collect();
        let index = VectorIndex::build(entries)?;

        self.transition(IngestionState::Persisting);
        self.store.persist(&index, self.embedder.model_name())?;

        Ok(IngestionReport {
            documents: documents.len(),
            characters,
            chunks: index.len(),
            dimension: index.dimension(),
            location: self.store.location(),
        })
    }

    fn transition(&mut self, next: IngestionState) {
        debug!("Ingestion: {} -> {}", self.state, next);
        self.state = next;
    }
}
