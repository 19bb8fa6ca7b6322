use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::ProviderError;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("No documents supplied, upload at least one file before processing")]
    NoDocuments,

    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Failed to extract text from {name}: {reason}")]
    Extraction { name: String, reason: String },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("No index found at {}, process some documents first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Cannot build an index without entries")]
    EmptyIndex,

    #[error("Retrieval width must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("Index at {} is corrupt: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Prompt is roughly {estimated} tokens, exceeding the generator limit of {limit}")]
    PromptTooLarge { estimated: usize, limit: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`QaError`], carried by the orchestrators'
/// failed states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoDocuments,
    EmptyQuestion,
    Extraction,
    Provider,
    IndexNotFound,
    DimensionMismatch,
    EmptyIndex,
    InvalidK,
    CorruptIndex,
    PromptTooLarge,
    Config,
    Io,
    Other,
}

impl QaError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDocuments => ErrorKind::NoDocuments,
            Self::EmptyQuestion => ErrorKind::EmptyQuestion,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Provider(_) => ErrorKind::Provider,
            Self::IndexNotFound(_) => ErrorKind::IndexNotFound,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::EmptyIndex => ErrorKind::EmptyIndex,
            Self::InvalidK(_) => ErrorKind::InvalidK,
            Self::CorruptIndex { .. } => ErrorKind::CorruptIndex,
            Self::PromptTooLarge { .. } => ErrorKind::PromptTooLarge,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod extractor;
pub mod index;
pub mod indexer;
pub mod prompt;
pub mod providers;
pub mod qa;
