
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::config::ConfigError;

/// Upper bound accepted for `max_chunk_size`
pub const MAX_CHUNK_SIZE_LIMIT: usize = 100_000;

/// A contiguous slice of the source text, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text
    pub content: String,
    /// Position of this chunk in the split sequence
    pub chunk_index: usize,
    /// Char offset of the first character within the source text
    pub start: usize,
    /// Char offset one past the last character within the source text
    pub end: usize,
}

impl TextChunk {
    /// Length of the chunk in chars
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Configuration for text splitting, measured in chars
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub max_chunk_size: usize,
    /// Maximum number of chars shared by adjacent chunks
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 5000,
            overlap_size: 1000,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(1..=MAX_CHUNK_SIZE_LIMIT).contains(&self.max_chunk_size) {
            return Err(ConfigError::InvalidMaxChunkSize(self.max_chunk_size));
        }

        if self.overlap_size >= self.max_chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.overlap_size,
                self.max_chunk_size,
            ));
        }

        Ok(())
    }
}

/// Split points, from the most to the least semantically meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARY_PREFERENCE: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

impl Boundary {
    /// Whether splitting `chars` before index `pos` lands on this boundary
    fn matches(self, chars: &[char], pos: usize) -> bool {
        let prev = pos.checked_sub(1).and_then(|i| chars.get(i)).copied();
        let before_prev = pos.checked_sub(2).and_then(|i| chars.get(i)).copied();

        match self {
            Self::Paragraph => before_prev == Some('\n') && prev == Some('\n'),
            Self::Line => prev == Some('\n'),
            Self::Sentence => {
                matches!(before_prev, Some('.' | '!' | '?'))
                    && prev.is_some_and(char::is_whitespace)
            }
            Self::Word => prev.is_some_and(char::is_whitespace),
        }
    }
}

/// Split text into overlapping chunks.
///
/// Every chunk is at most `max_chunk_size` chars, adjacent chunks share at
/// most `overlap_size` chars, and dropping each chunk's overlap with its
/// predecessor and concatenating yields the input exactly. Splitting stops as
/// soon as a chunk reaches the end of the text, so a chunk always contributes
/// at least one char its predecessor did not cover.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();

    if total == 0 {
        return Ok(chunks);
    }

    let mut start = 0;
    loop {
        let end = find_chunk_end(&chars, start, config);
        chunks.push(TextChunk {
            content: chars[start..end].iter().collect(),
            chunk_index: chunks.len(),
            start,
            end,
        });

        if end == total {
            break;
        }

        start = find_next_start(&chars, end, config.overlap_size);
    }

    debug!(
        "Split {} chars into {} chunks (max {}, overlap {})",
        total,
        chunks.len(),
        config.max_chunk_size,
        config.overlap_size
    );

    Ok(chunks)
}

/// Pick the end of the chunk starting at `start`.
///
/// Ends closer than `overlap_size + 1` to `start` are never chosen, which
/// keeps the following chunk's start strictly ahead of this one.
fn find_chunk_end(chars: &[char], start: usize, config: &ChunkingConfig) -> usize {
    let hard_limit = (start + config.max_chunk_size).min(chars.len());
    if hard_limit == chars.len() {
        return hard_limit;
    }

    let earliest = start + config.overlap_size + 1;
    for boundary in BOUNDARY_PREFERENCE {
        if let Some(pos) = (earliest..=hard_limit)
            .rev()
            .find(|&pos| boundary.matches(chars, pos))
        {
            return pos;
        }
    }

    hard_limit
}

/// Pick where the chunk after `end` begins, inside the overlap window
fn find_next_start(chars: &[char], end: usize, overlap_size: usize) -> usize {
    let earliest = end - overlap_size;
    for boundary in BOUNDARY_PREFERENCE {
        if let Some(pos) = (earliest..end).find(|&pos| boundary.matches(chars, pos)) {
            return pos;
        }
    }

    earliest
}
