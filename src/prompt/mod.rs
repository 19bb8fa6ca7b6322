// Prompt module
// Renders the grounded-answer prompt and post-processes generated answers


use tracing::debug;

use crate::{QaError, Result};

/// Literal the generator is told to emit when the context has no answer
pub const SENTINEL: &str = "answer is not available in the context";

/// Shown when the generator returns nothing
pub const NO_RESPONSE: &str = "No response generated.";

/// Separator placed between retrieved chunks
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const TEMPLATE_HEAD: &str = "Answer the question as detailed as possible from the provided context, \
make sure to provide all the details. Use only the provided context. If the answer is not in the \
provided context just say, \"answer is not available in the context\", don't provide the wrong answer.\n\n";

/// Rough token count for English text
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // 1 token ≈ 0.75 words, plus extra for punctuation
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}

/// Builds generator prompts from retrieved context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptBuilder {
    max_input_tokens: Option<usize>,
}

impl PromptBuilder {
    /// Builder that rejects prompts estimated above `max_input_tokens`
    #[inline]
    pub fn new(max_input_tokens: Option<usize>) -> Self {
        Self { max_input_tokens }
    }

    #[inline]
    pub fn max_input_tokens(&self) -> Option<usize> {
        self.max_input_tokens
    }

    /// Render the prompt for `question` over `context`, most similar chunk
    /// first. Context is never truncated; an oversized prompt is an error.
    #[inline]
    pub fn render(&self, context: &[String], question: &str) -> Result<String> {
        let joined = context.join(CONTEXT_SEPARATOR);
        let prompt =
            format!("{TEMPLATE_HEAD}Context:\n{joined}\n\nQuestion:\n{question}\n\nAnswer:\n");

        if let Some(limit) = self.max_input_tokens {
            let estimated = estimate_token_count(&prompt);
            if estimated > limit {
                return Err(QaError::PromptTooLarge { estimated, limit });
            }
        }

        debug!(
            "Rendered prompt with {} context chunks ({} chars)",
            context.len(),
            prompt.len()
        );

        Ok(prompt)
    }
}

/// A generated answer after post-processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    #[inline]
    pub fn from_generated(generated: &str) -> Self {
        let trimmed = generated.trim();
        let text = if trimmed.is_empty() {
            NO_RESPONSE.to_string()
        } else {
            trimmed.to_string()
        };
        Self { text }
    }

    /// Whether the generator reported that the context holds no answer
    #[inline]
    pub fn is_not_in_context(&self) -> bool {
        self.text.to_lowercase().contains(SENTINEL)
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
