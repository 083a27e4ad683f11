use crate::{err, error::MedragError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum DocumentType {
    Pdf,
    Text,
}

impl TryFrom<&str> for DocumentType {
    type Error = MedragError;

    fn try_from(ext: &str) -> Result<Self, Self::Error> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "md" => Ok(Self::Text),
            _ => err!(UnsupportedFileType, "{ext}"),
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// A file in a document store.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSource {
    /// File name, unique within the store. Used as the source identifier of its chunks.
    pub name: String,

    /// Location of the file in the store.
    pub path: String,

    pub ty: DocumentType,

    /// Size in bytes.
    pub size: u64,
}

/// A text element extracted from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number, if the format has pages.
    pub number: Option<u32>,
    pub text: String,
}

impl Page {
    pub fn new(number: Option<u32>, text: String) -> Self {
        Self { number, text }
    }
}

/// A bounded span of text from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub content: String,

    /// Name of the document the chunk originates from.
    pub source: String,

    /// Page the chunk was extracted from.
    pub page: Option<u32>,

    /// Position of the chunk in its source document.
    pub index: usize,
}

/// A chunk with its embedding, ready to be stored.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,

    /// SHA-256 hash of the source document's content at the time of indexing.
    pub hash: String,
}

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
}

/// Vector collection as seen by a vector database.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VectorCollection {
    pub name: String,

    /// Vector dimension.
    pub size: usize,
}

impl VectorCollection {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Generated answer to a question.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,

    /// Model that generated the answer.
    pub model: String,

    /// Chunks the answer is based on.
    pub sources: Vec<ScoredChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_from_extension() {
        assert_eq!(DocumentType::Pdf, DocumentType::try_from("PDF").unwrap());
        assert_eq!(DocumentType::Text, DocumentType::try_from("txt").unwrap());
        assert_eq!(DocumentType::Text, DocumentType::try_from("md").unwrap());
        assert!(DocumentType::try_from("docx").is_err());
    }
}
