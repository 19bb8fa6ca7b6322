// Providers module
// Capability traits for the embedding and generation models, plus the
// concrete Gemini implementation

pub mod gemini;


use std::fmt;

use thiserror::Error;

pub use gemini::GeminiClient;

/// Failure reported by an external model provider. Never retried by the
/// pipeline itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Missing or rejected API credential")]
    Unauthenticated,
    #[error("Provider quota exhausted")]
    QuotaExceeded,
    #[error("Provider returned HTTP {0}")]
    Status(u16),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Maps text to a fixed-dimension vector
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model, recorded alongside persisted indexes
    fn model_name(&self) -> &str;

    /// Embed a single passage of document text
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed many passages. The returned vectors are in the same order as
    /// `texts`. Providers with native batching should override this.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Embed a question. Defaults to [`Embedder::embed`].
    fn embed_query(&self, question: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed(question)
    }
}

/// Maps a prompt to generated text
pub trait Generator: Send + Sync {
    /// Single blocking generation call
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError>;

    /// Largest prompt the model accepts, in tokens, if known
    fn max_input_tokens(&self) -> Option<usize> {
        None
    }
}

/// Provider credential. Its `Debug` output never contains the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[inline]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Read the credential from the named environment variable
    #[inline]
    pub fn from_env(var: &str) -> Option<Self> {
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    /// Resolve the credential through an arbitrary variable lookup
    #[inline]
    pub fn from_lookup<F>(var: &str, lookup: F) -> Option<Self>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        lookup(var).and_then(Self::new)
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
