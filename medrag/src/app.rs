pub mod batch;
pub mod document;
pub mod embedder;
pub mod llm;
pub mod server;
pub mod state;
pub mod vector;

#[cfg(test)]
pub mod test;
