//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod ollama_adapter;
mod process_pull_adapter;

pub use ollama_adapter::OllamaAdapter;
pub use process_pull_adapter::ProcessPullAdapter;
