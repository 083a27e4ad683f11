use super::model::{Chunk, Page};
use crate::error::MedragError;
use crate::map_err;
use chunx::ChunkerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ChunkConfig {
    Recursive(RecursiveConfig),
    Sliding(SlidingWindowConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecursiveConfig {
    pub size: usize,
    pub overlap: usize,

    /// Tried in order. Omit to use paragraphs, lines, words and characters.
    #[serde(default)]
    pub separators: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SlidingWindowConfig {
    pub size: usize,
    pub overlap: usize,
}

impl ChunkConfig {
    /// Create a `RecursiveSplitter` config with the default separators.
    ///
    /// * `size`: Maximum chunk size in characters.
    /// * `overlap`: Maximum characters shared with the previous chunk.
    pub fn recursive(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        chunx::RecursiveSplitter::new(size, overlap)?;
        Ok(Self::Recursive(RecursiveConfig {
            size,
            overlap,
            separators: None,
        }))
    }

    /// Create a `SlidingWindow` config.
    ///
    /// * `size`: Chunk size in characters.
    /// * `overlap`: Characters shared by neighbouring chunks.
    pub fn sliding(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        chunx::SlidingWindow::new(size, overlap)?;
        Ok(Self::Sliding(SlidingWindowConfig { size, overlap }))
    }

    pub fn chunk<'a>(&self, input: &'a str) -> Result<Vec<&'a str>, ChunkerError> {
        match self {
            Self::Recursive(RecursiveConfig {
                size,
                overlap,
                separators,
            }) => {
                let mut splitter = chunx::RecursiveSplitter::new(*size, *overlap)?;
                if let Some(separators) = separators {
                    splitter = splitter.with_separators(separators.clone());
                }
                splitter.chunk(input)
            }
            Self::Sliding(SlidingWindowConfig { size, overlap }) => {
                chunx::SlidingWindow::new(*size, *overlap)?.chunk(input)
            }
        }
    }

    /// Chunk every page of a document. Chunk indices are counted across the whole
    /// document, chunks never span pages.
    ///
    /// * `source`: Name of the document the pages belong to.
    /// * `pages`: Parsed pages.
    pub fn chunk_pages(&self, source: &str, pages: &[Page]) -> Result<Vec<Chunk>, MedragError> {
        let mut chunks = vec![];

        for page in pages {
            for content in map_err!(self.chunk(&page.text)) {
                chunks.push(Chunk {
                    content: content.to_string(),
                    source: source.to_string(),
                    page: page.number,
                    index: chunks.len(),
                });
            }
        }

        Ok(chunks)
    }
}

impl std::fmt::Display for ChunkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recursive(_) => write!(f, "RecursiveSplitter"),
            Self::Sliding(_) => write!(f, "SlidingWindow"),
        }
    }
}
