//! AI Core - Ollama inference client
//!
//! Talks to a local Ollama server over its native HTTP API: model listing,
//! blocking and streamed generation, and the retry policy shared by every
//! outbound call.

pub mod config;
pub mod error;
pub mod ollama;
pub mod ports;
pub mod retry;

pub use config::InferenceConfig;
pub use error::InferenceError;
pub use ollama::OllamaClient;
pub use ports::{
    GenerateOptions, GenerateRequest, GenerateResponse, InferenceEngine, StreamingChunk,
    StreamingResponse,
};
pub use retry::{RetryConfig, Retryable};
