/// Embedder implementation for fastembed when running it locally.
#[cfg(feature = "fe-local")]
pub mod fastembed;

#[cfg(feature = "openai")]
pub mod openai;
