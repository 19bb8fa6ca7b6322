// QA module
// Query pipeline: question -> vector -> retrieved chunks -> prompt -> answer

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::index::IndexStore;
use crate::prompt::{Answer, PromptBuilder};
use crate::providers::{Embedder, Generator};
use crate::{ErrorKind, QaError, Result};

/// Number of chunks retrieved per question unless configured otherwise
pub const DEFAULT_TOP_K: usize = 4;

/// Sampling temperature used for answers unless configured otherwise
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Stage of a single question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaState {
    Idle,
    EmbeddingQuestion,
    Retrieving,
    Prompting,
    Generating,
    Answered,
    Failed(ErrorKind),
}

impl fmt::Display for QaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::EmbeddingQuestion => write!(f, "embedding question"),
            Self::Retrieving => write!(f, "retrieving"),
            Self::Prompting => write!(f, "prompting"),
            Self::Generating => write!(f, "generating"),
            Self::Answered => write!(f, "answered"),
            Self::Failed(kind) => write!(f, "failed ({kind:?})"),
        }
    }
}

/// Answers questions against the persisted index
pub struct QuestionAnswerer {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: IndexStore,
    prompt_builder: PromptBuilder,
    top_k: usize,
    temperature: f32,
    state: QaState,
}

impl QuestionAnswerer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: IndexStore,
    ) -> Self {
        let prompt_builder = PromptBuilder::new(generator.max_input_tokens());
        Self {
            embedder,
            generator,
            store,
            prompt_builder,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            state: QaState::Idle,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[inline]
    pub fn state(&self) -> QaState {
        self.state
    }

    /// Answer `question` from the persisted index.
    ///
    /// Every call embeds the question, loads the index and generates afresh.
    /// A generator reply of "answer is not available in the context" is
    /// returned as a normal answer.
    #[inline]
    pub fn ask(&mut self, question: &str) -> Result<Answer> {
        self.state = QaState::Idle;

        match self.run(question) {
            Ok(answer) => {
                self.transition(QaState::Answered);
                info!(
                    "Answered question ({} chars{})",
                    answer.text.chars().count(),
                    if answer.is_not_in_context() {
                        ", not in context"
                    } else {
                        ""
                    }
                );
                Ok(answer)
            }
            Err(e) => {
                self.transition(QaState::Failed(e.kind()));
                warn!("Question failed: {}", e);
                Err(e)
            }
        }
    }

    fn run(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::EmptyQuestion);
        }

        self.transition(QaState::EmbeddingQuestion);
        let query = self.embedder.embed_query(question)?;

        self.transition(QaState::Retrieving);
        let index = self.store.load(query.len())?;
        let results = index.query(&query, self.top_k)?;
        debug!(
            "Retrieved {} chunks, nearest at distance {:?}",
            results.len(),
            results.first().map(|r| r.distance)
        );
        let context: Vec<String> = results.into_iter().map(|r| r.text).collect();

        self.transition(QaState::Prompting);
        let prompt = self.prompt_builder.render(&context, question)?;

        self.transition(QaState::Generating);
        let generated = self.generator.generate(&prompt, self.temperature)?;

        Ok(Answer::from_generated(&generated))
    }

    fn transition(&mut self, next: QaState) {
        debug!("QA: {} -> {}", self.state, next);
        self.state = next;
    }
}
