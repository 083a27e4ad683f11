//! The core module defines the business logic of medrag.
//! It provides the traits and models upstream adapters need to implement.

pub mod chunk;
pub mod document;
pub mod embedder;
pub mod llm;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod service;
pub mod vector;
