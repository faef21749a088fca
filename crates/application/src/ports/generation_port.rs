//! Generation port - Interface for text generation

use std::pin::Pin;

use async_trait::async_trait;
use domain::{GenerationRequest, ModelName};
use futures::Stream;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Raw text deltas of a streamed generation, in arrival order
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ApplicationError>> + Send>>;

/// Port for generation against the inference server
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Start a streamed generation.
    ///
    /// The returned stream ends when the server signals completion; a
    /// failure mid-stream is yielded as its last item.
    async fn stream_generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, ApplicationError>;

    /// Load a model into memory
    async fn preload(&self, model: &ModelName) -> Result<(), ApplicationError>;
}
