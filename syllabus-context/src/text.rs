//! Sentence-aware splitting of long text into overlapping chunks.
//!
//! Retrieval works best when every embedded unit is short enough for the
//! embedding model and still reads as a complete thought. This module walks a
//! text in fixed-size character windows and, where it can, pulls the end of a
//! window back to the last sentence terminator so chunks end on `.`, `!` or `?`.
//! Consecutive chunks share up to `overlap` characters of source text so a
//! sentence cut at a boundary is still visible in full in one of the chunks.
//!
//! Lengths are measured in Unicode scalar values (`char`s), not bytes, so
//! multi-byte text gets the same chunk geometry as ASCII text.
//!
//! # Rules
//!
//! *   Text no longer than `chunk_size` is returned unchanged as a single chunk.
//! *   Every window except the final one looks backward for the last terminator.
//!     The window is cut just after it only when it sits past the middle of the
//!     window; otherwise the window is emitted at its full `chunk_size`.
//! *   The next window starts `overlap` characters before the previous end.
//! *   Emitted chunks are trimmed of surrounding whitespace, and chunks that
//!     trim to nothing are dropped.
//!
//! # Example
//!
//! ```
//! use syllabus_context::text::TextSplitter;
//!
//! let splitter = TextSplitter::new(10, 2).unwrap();
//! let chunks = splitter.split("A. B. C. D. E. F.");
//!
//! assert_eq!(chunks, vec!["A. B. C.", "C. D. E.", "E. F."]);
//! assert!(chunks.iter().all(|c| c.chars().count() <= 10));
//! ```
use serde::Serialize;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared by consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 200;

/// Characters treated as the end of a sentence when choosing a cut point.
pub const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];

/// Errors raised when a splitter is configured with unusable parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    /// The chunk size or overlap cannot guarantee forward progress.
    #[error("Invalid splitter configuration: {message}")]
    InvalidConfig { message: String },
}

/// Splits text into overlapping, sentence-aligned chunks.
///
/// Construct with [`TextSplitter::new`] to validate the parameters, or use
/// [`TextSplitter::default`] for 1000-character chunks with a 200-character
/// overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

/// One chunk produced by [`TextSplitter::chunks`].
///
/// `char_start..char_end` is the untrimmed window in the source text, counted
/// in characters. `text` is that window with surrounding whitespace removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Position of this chunk in reassembly order (0-indexed).
    pub sequence: usize,
    /// First character of the window in the source text.
    pub char_start: usize,
    /// One past the last character of the window in the source text.
    pub char_end: usize,
    /// Trimmed chunk content.
    pub text: String,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl TextSplitter {
    /// Creates a splitter, rejecting a zero chunk size or an overlap that is
    /// not strictly smaller than the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::InvalidConfig {
                message: "chunk_size must be greater than zero".to_string(),
            });
        }
        if overlap >= chunk_size {
            return Err(SplitError::InvalidConfig {
                message: format!(
                    "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
                ),
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` and returns only the chunk strings, in order.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.chunks(text).into_iter().map(|c| c.text).collect()
    }

    /// Splits `text` into [`TextChunk`]s carrying their source window.
    pub fn chunks(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every char boundary, including the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        if total <= self.chunk_size {
            return vec![TextChunk {
                sequence: 0,
                char_start: 0,
                char_end: total,
                text: text.to_string(),
            }];
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let mut end = start + self.chunk_size;
            let is_final = end >= total;

            if is_final {
                end = total;
            } else if let Some(cut) = self.sentence_cut(&chars[start..end]) {
                end = start + cut + 1;
            }

            let window = text[offsets[start]..offsets[end]].trim();
            if !window.is_empty() {
                chunks.push(TextChunk {
                    sequence: chunks.len(),
                    char_start: start,
                    char_end: end,
                    text: window.to_string(),
                });
            }

            if is_final {
                break;
            }

            // A short sentence-aligned window can be smaller than the overlap;
            // restart at its end so `start` always moves forward.
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Index of the last terminator in `window`, if it lies past the midpoint.
    fn sentence_cut(&self, window: &[char]) -> Option<usize> {
        window
            .iter()
            .rposition(|c| SENTENCE_TERMINATORS.contains(c))
            .filter(|&pos| pos > self.chunk_size / 2)
    }
}

/// Splits `text` with the given parameters.
///
/// Convenience wrapper around [`TextSplitter::new`] and [`TextSplitter::split`].
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, SplitError> {
    Ok(TextSplitter::new(chunk_size, overlap)?.split(text))
}
