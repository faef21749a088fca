//! Generation request entity

use serde::{Deserialize, Serialize};

use crate::value_objects::{ModelName, Temperature};

/// One prompt sent to the inference server, built fresh per user turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model to generate with
    pub model: ModelName,
    /// Prompt text, already trimmed
    pub prompt: String,
    /// Sampling temperature
    pub temperature: Temperature,
    /// Whether the response should be streamed
    pub stream: bool,
}

impl GenerationRequest {
    /// Create a streaming request
    pub fn streaming(model: ModelName, prompt: &str, temperature: Temperature) -> Self {
        Self {
            model,
            prompt: prompt.trim().to_string(),
            temperature,
            stream: true,
        }
    }

    /// Create a request that waits for the full response
    pub fn blocking(model: ModelName, prompt: &str) -> Self {
        Self {
            model,
            prompt: prompt.trim().to_string(),
            temperature: Temperature::default(),
            stream: false,
        }
    }
}
