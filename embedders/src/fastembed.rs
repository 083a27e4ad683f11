/// Embedder implementation for fastembed when running it locally.
mod local;

pub use local::LocalFastEmbedder;
