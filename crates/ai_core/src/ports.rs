//! Port definitions for the inference client
//!
//! Request and response shapes of Ollama's `/api/generate` plus the
//! [`InferenceEngine`] trait the infrastructure adapters consume.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Body of `POST /api/generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model to generate with
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Whether the server should stream NDJSON
    pub stream: bool,
    /// Sampling options
    #[serde(default, skip_serializing_if = "GenerateOptions::is_empty")]
    pub options: GenerateOptions,
}

/// Sampling options understood by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none()
    }
}

impl GenerateRequest {
    /// Streamed request with a temperature
    pub fn streaming(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
            options: GenerateOptions {
                temperature: Some(temperature),
            },
        }
    }

    /// Blocking request using the model's default options
    pub fn blocking(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options: GenerateOptions::default(),
        }
    }
}

/// Reply to a blocking generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    /// Server-side wall time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
}

/// One decoded line of a streamed generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingChunk {
    /// Text delta
    pub content: String,
    /// Whether the server marked the generation finished
    pub done: bool,
}

/// Stream of decoded chunks; ends after `done` or the first error
pub type StreamingResponse =
    Pin<Box<dyn Stream<Item = Result<StreamingChunk, InferenceError>> + Send>>;

/// Port for inference server clients
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Generate a streaming response
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<StreamingResponse, InferenceError>;

    /// Load a model into memory with a throwaway prompt
    async fn preload(&self, model: &str) -> Result<(), InferenceError>;

    /// Names of locally available models
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;
}
