//! Ollama HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::streaming::create_stream;
use crate::{
    config::InferenceConfig,
    error::InferenceError,
    ports::{GenerateRequest, GenerateResponse, InferenceEngine, StreamingResponse},
    retry::retry,
};

/// Prompt used to force a model into memory
const PRELOAD_PROMPT: &str = "ping";

/// Client for Ollama's native API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: InferenceConfig,
}

/// `GET /api/tags` response
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| InferenceError::ConnectionFailed(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            max_retries = config.retry.max_retries,
            "Initialized Ollama client"
        );

        Ok(Self { client, config })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Send a request under the retry policy, rejecting non-success statuses
    async fn execute<F>(&self, timeout: Duration, build: F) -> Result<Response, InferenceError>
    where
        F: Fn() -> RequestBuilder,
    {
        retry(&self.config.retry, || {
            let request = build().timeout(timeout);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| InferenceError::from_transport(&e, timeout))?;

                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "Inference server returned an error");
                Err(InferenceError::ServerError {
                    status: status.as_u16(),
                    body,
                })
            }
        })
        .await
    }

    async fn generate_with_timeout(
        &self,
        mut request: GenerateRequest,
        timeout: Duration,
    ) -> Result<GenerateResponse, InferenceError> {
        request.stream = false;
        let url = self.api_url("generate");

        let response = self
            .execute(timeout, || self.client.post(&url).json(&request))
            .await?;

        response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl InferenceEngine for OllamaClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate_stream(
        &self,
        mut request: GenerateRequest,
    ) -> Result<StreamingResponse, InferenceError> {
        request.stream = true;
        let url = self.api_url("generate");

        debug!("Starting streaming request");
        let response = self
            .execute(self.config.stream_timeout(), || {
                self.client.post(&url).json(&request)
            })
            .await?;

        Ok(create_stream(response))
    }

    #[instrument(skip(self))]
    async fn preload(&self, model: &str) -> Result<(), InferenceError> {
        let start = Instant::now();
        self.generate_with_timeout(
            GenerateRequest::blocking(model, PRELOAD_PROMPT),
            self.config.preload_timeout(),
        )
        .await?;

        info!(
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Model loaded"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = self.api_url("tags");
        let response = self
            .execute(self.config.request_timeout(), || self.client.get(&url))
            .await?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}
