//! Model registry port
//!
//! Defines the interface for discovering locally available models.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for model registry queries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelRegistryPort: Send + Sync {
    /// Names of all locally available models
    async fn list_models(&self) -> Result<Vec<String>, ApplicationError>;
}
