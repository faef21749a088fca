//! Ollama adapter - Implements the registry and generation ports using ai_core

use std::{sync::Arc, time::Instant};

use ai_core::{GenerateRequest, InferenceConfig, InferenceEngine, InferenceError, OllamaClient};
use application::{
    error::ApplicationError,
    ports::{GenerationPort, ModelRegistryPort, TextStream},
};
use async_trait::async_trait;
use domain::{GenerationRequest, ModelName};
use futures::StreamExt;
use tracing::{debug, instrument};

/// Adapter for an Ollama-compatible inference server
#[derive(Clone)]
pub struct OllamaAdapter {
    engine: Arc<dyn InferenceEngine>,
}

impl std::fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaAdapter").finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Create an adapter with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize.
    pub fn new(config: InferenceConfig) -> Result<Self, ApplicationError> {
        let client = OllamaClient::new(config)
            .map_err(|e| ApplicationError::Configuration(e.to_string()))?;
        Ok(Self::with_engine(Arc::new(client)))
    }

    /// Wrap an existing engine
    pub fn with_engine(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    /// Convert ai_core error to application error
    fn map_error(e: InferenceError) -> ApplicationError {
        match e {
            InferenceError::ConnectionFailed(_) | InferenceError::Timeout(_) => {
                ApplicationError::Unavailable(e.to_string())
            },
            other => ApplicationError::Inference(other.to_string()),
        }
    }
}

#[async_trait]
impl ModelRegistryPort for OllamaAdapter {
    async fn list_models(&self) -> Result<Vec<String>, ApplicationError> {
        self.engine.list_models().await.map_err(Self::map_error)
    }
}

#[async_trait]
impl GenerationPort for OllamaAdapter {
    #[instrument(skip(self, request), fields(model = %request.model, prompt_len = request.prompt.len()))]
    async fn stream_generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, ApplicationError> {
        let request = GenerateRequest::streaming(
            request.model.as_str(),
            request.prompt.as_str(),
            request.temperature.value(),
        );

        let chunks = self
            .engine
            .generate_stream(request)
            .await
            .map_err(Self::map_error)?;
        debug!("Generation stream opened");

        Ok(Box::pin(chunks.map(|chunk| {
            chunk
                .map(|c| c.content)
                .map_err(Self::map_error)
        })))
    }

    #[instrument(skip(self), fields(model = %model))]
    async fn preload(&self, model: &ModelName) -> Result<(), ApplicationError> {
        let start = Instant::now();
        self.engine
            .preload(model.as_str())
            .await
            .map_err(Self::map_error)?;
        debug!(elapsed_ms = start.elapsed().as_millis(), "Model preloaded");
        Ok(())
    }
}
