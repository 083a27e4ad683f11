use std::{error::Error as _, string::FromUtf8Error};
use thiserror::Error;
use tracing::error;
use validify::ValidationErrors;

#[cfg(any(feature = "fe-local", feature = "openai"))]
use medrag_embedders::error::EmbeddingError;

#[cfg(feature = "qdrant")]
use qdrant_client::QdrantError;

pub mod http;

#[derive(Debug, Error)]
pub enum MedragErr {
    #[error("Unable to send job to ingestion executor")]
    Batch,

    #[error("Does not exist; {0}")]
    DoesNotExist(String),

    #[error("Already exists; {0}")]
    AlreadyExists(String),

    #[error("Invalid file name; {0}")]
    InvalidFileName(String),

    #[error("Unsupported file type; {0}")]
    UnsupportedFileType(String),

    #[error("Invalid embedding model; {0}")]
    InvalidEmbeddingModel(String),

    #[error("Invalid provider; {0}")]
    InvalidProvider(String),

    #[error("Invalid prompt; {0}")]
    InvalidPrompt(String),

    #[error("parse configuration: {0}")]
    ParseConfig(String),

    /// An upstream service answered with a non success status.
    #[error("{service} responded with {status}; {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// An upstream service answered with something we could not make sense of.
    #[error("{service} response; {message}")]
    UpstreamResponse {
        service: &'static str,
        message: String,
    },

    #[cfg(any(feature = "fe-local", feature = "openai"))]
    #[error("embedding error; {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Http client; {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO; {0}")]
    IO(#[from] std::io::Error),

    #[error("UTF-8; {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("JSON error; {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("chunker: {0}")]
    Chunker(#[from] chunx::ChunkerError),

    #[error("Parse pdf; {0}")]
    ParsePdf(#[from] lopdf::Error),

    #[error("Validation; {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Regex; {0}")]
    Regex(#[from] regex::Error),

    #[error("Task; {0}")]
    Join(#[from] tokio::task::JoinError),

    #[cfg(feature = "qdrant")]
    #[error("Qdrant; {0}")]
    Qdrant(#[from] QdrantError),
}

#[derive(Debug, Error)]
#[error("{error}")]
pub struct MedragError {
    file: &'static str,
    line: u32,
    column: u32,
    pub error: MedragErr,
}

impl MedragError {
    pub fn new(file: &'static str, line: u32, column: u32, error: MedragErr) -> MedragError {
        MedragError {
            file,
            line,
            column,
            error,
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }

    pub fn print(&self) {
        let location = self.location();

        error!("{location} | {self}");

        if self.error.source().is_some() {
            error!("Causes:");
        }

        let mut src = self.error.source();
        while let Some(source) = src {
            error!(" - {source}");
            src = source.source();
        }
    }
}

#[macro_export]
macro_rules! err {
    ($ty:ident $(, $l:literal $(,)? $($args:expr),* )?) => {
        Err($crate::error::MedragError::new(
            file!(),
            line!(),
            column!(),
            $crate::error::MedragErr::$ty $( (format!($l, $( $args, )*)) )?,
        ))
    };
}

#[macro_export]
macro_rules! map_err {
    ($ex:expr) => {
        $ex.map_err(|e| $crate::error::MedragError::new(file!(), line!(), column!(), e.into()))?
    };
}

/// Construct an [MedragErr::Upstream] error at the call site.
#[macro_export]
macro_rules! upstream_err {
    ($service:expr, $status:expr, $body:expr) => {
        Err($crate::error::MedragError::new(
            file!(),
            line!(),
            column!(),
            $crate::error::MedragErr::Upstream {
                service: $service,
                status: $status,
                body: $body,
            },
        ))
    };
}
