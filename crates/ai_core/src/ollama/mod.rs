//! Ollama native API client

mod client;
pub mod streaming;

pub use client::OllamaClient;
