//! Model registry client
//!
//! Wraps the registry port with the forgiving semantics the UI needs: an
//! unreachable server is an empty listing, not an error.

use std::{fmt, sync::Arc};

use domain::ModelName;
use tracing::{debug, instrument, warn};

use crate::ports::ModelRegistryPort;

/// Service for querying locally available models
#[derive(Clone)]
pub struct ModelRegistryClient {
    port: Arc<dyn ModelRegistryPort>,
}

impl fmt::Debug for ModelRegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistryClient").finish_non_exhaustive()
    }
}

impl ModelRegistryClient {
    /// Create a new registry client
    pub fn new(port: Arc<dyn ModelRegistryPort>) -> Self {
        Self { port }
    }

    /// Locally available model names; empty when the registry is unavailable
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Vec<String> {
        match self.port.list_models().await {
            Ok(models) => {
                debug!(count = models.len(), "Fetched model list");
                models
            },
            Err(e) => {
                warn!(error = %e, "Error fetching models");
                Vec::new()
            },
        }
    }

    /// Whether the registry answers at all
    pub async fn is_reachable(&self) -> bool {
        self.port.list_models().await.is_ok()
    }

    /// Whether `model`, or a model sharing its base name, is listed
    pub async fn is_visible(&self, model: &ModelName) -> bool {
        model.is_listed_in(&self.list_models().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplicationError;
    use crate::ports::MockModelRegistryPort;

    fn client_returning(result: Result<Vec<String>, ApplicationError>) -> ModelRegistryClient {
        let mut port = MockModelRegistryPort::new();
        let mut result = Some(result);
        port.expect_list_models()
            .times(1)
            .returning(move || result.take().unwrap_or_else(|| Ok(Vec::new())));
        ModelRegistryClient::new(Arc::new(port))
    }

    #[tokio::test]
    async fn lists_models() {
        let client = client_returning(Ok(vec!["llama3:8b".into(), "phi3".into()]));
        assert_eq!(client.list_models().await, vec!["llama3:8b", "phi3"]);
    }

    #[tokio::test]
    async fn unreachable_registry_is_empty_list() {
        let client = client_returning(Err(ApplicationError::Unavailable("refused".into())));
        assert!(client.list_models().await.is_empty());
    }

    #[tokio::test]
    async fn reachability_reflects_errors() {
        let client = client_returning(Err(ApplicationError::Unavailable("refused".into())));
        assert!(!client.is_reachable().await);

        let client = client_returning(Ok(vec![]));
        assert!(client.is_reachable().await);
    }

    #[tokio::test]
    async fn visible_by_exact_name() {
        let client = client_returning(Ok(vec!["phi3:mini".into()]));
        assert!(client.is_visible(&ModelName::parse("phi3:mini").unwrap()).await);
    }

    #[tokio::test]
    async fn visible_by_base_name() {
        let client = client_returning(Ok(vec!["llama3:latest".into()]));
        assert!(client.is_visible(&ModelName::parse("llama3").unwrap()).await);
    }

    #[tokio::test]
    async fn not_visible_when_missing() {
        let client = client_returning(Ok(vec!["phi3".into()]));
        assert!(!client.is_visible(&ModelName::parse("mistral").unwrap()).await);
    }
}
