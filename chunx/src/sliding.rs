use super::ChunkerError;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SLIDING_WINDOW_DEFAULT_SIZE: usize = 500;
const SLIDING_WINDOW_DEFAULT_OVERLAP: usize = 20;

/// The most basic of chunkers.
///
/// Every chunk holds at most `size` characters and every chunk after the first
/// starts `size - overlap` characters after the previous one, i.e. neighbouring
/// chunks share `overlap` characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindow {
    pub size: usize,
    pub overlap: usize,
}

impl SlidingWindow {
    /// Create a new `SlidingWindow` chunker.
    /// Errors if `size` is 0 or `overlap` is not less than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        super::check_bounds(size, overlap)?;
        Ok(Self { size, overlap })
    }

    pub fn chunk<'a>(&self, input: &'a str) -> Result<Vec<&'a str>, ChunkerError> {
        let SlidingWindow { size, overlap } = *self;

        super::check_bounds(size, overlap)?;

        let input = input.trim();

        if input.is_empty() {
            return Ok(vec![]);
        }

        // Byte offsets of every char, plus the end of input so windows can end on it.
        let mut offsets = input.char_indices().map(|(i, _)| i).collect::<Vec<_>>();
        let total_chars = offsets.len();
        offsets.push(input.len());

        let step = size - overlap;
        let mut chunks = vec![];
        let mut start = 0;

        loop {
            let end = (start + size).min(total_chars);
            chunks.push(&input[offsets[start]..offsets[end]]);

            if end == total_chars {
                break;
            }

            start += step;
        }

        debug!(
            "Chunked {} chunks, avg chunk size: {}",
            chunks.len(),
            chunks.iter().fold(0, |acc, el| acc + el.len()) / chunks.len()
        );

        Ok(chunks)
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self {
            size: SLIDING_WINDOW_DEFAULT_SIZE,
            overlap: SLIDING_WINDOW_DEFAULT_OVERLAP,
        }
    }
}
