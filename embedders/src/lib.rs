//! Clients for text embedding models.

pub mod error;

/// Local ONNX embedding models.
#[cfg(feature = "fe-local")]
pub mod fastembed;

/// OpenAI compatible embedding endpoints.
#[cfg(feature = "openai")]
pub mod openai;
