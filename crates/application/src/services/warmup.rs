//! Startup warm-up
//!
//! Waits for the inference server to list models, picks the initial model and
//! loads it into memory so the first chat turn is not stuck behind a cold
//! start.

use std::{fmt, sync::Arc, time::Duration};

use domain::{ModelCatalog, ModelName};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use super::model_registry::ModelRegistryClient;
use crate::ports::GenerationPort;

/// Startup configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupConfig {
    /// How long to wait for a non-empty model list, in seconds
    #[serde(default = "default_model_wait_secs")]
    pub model_wait_secs: u64,

    /// Delay between registry checks while waiting, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Load the initial model before serving
    #[serde(default = "default_true")]
    pub preload: bool,
}

const fn default_model_wait_secs() -> u64 {
    60
}

const fn default_poll_interval_secs() -> u64 {
    2
}

const fn default_true() -> bool {
    true
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            model_wait_secs: default_model_wait_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            preload: default_true(),
        }
    }
}

/// Service running the startup sequence
pub struct WarmupService {
    registry: ModelRegistryClient,
    generation: Arc<dyn GenerationPort>,
    config: StartupConfig,
}

impl fmt::Debug for WarmupService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmupService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WarmupService {
    /// Create a new warm-up service
    pub fn new(
        registry: ModelRegistryClient,
        generation: Arc<dyn GenerationPort>,
        config: StartupConfig,
    ) -> Self {
        Self {
            registry,
            generation,
            config,
        }
    }

    /// Wait for models, select the initial one and preload it
    pub async fn run(&self, preferred: Option<String>) -> ModelCatalog {
        let models = self.wait_for_models().await;
        let catalog = ModelCatalog::with_models(preferred, models);

        match catalog.selected_model() {
            Some(model) if self.config.preload => self.preload(&model).await,
            Some(model) => info!(model = %model, "Initial model selected"),
            None => warn!("No model available to select"),
        }

        catalog
    }

    /// Poll the registry until it lists at least one model or the wait is over
    #[instrument(skip(self))]
    pub async fn wait_for_models(&self) -> Vec<String> {
        let poll = Duration::from_secs(self.config.poll_interval_secs.max(1));
        let deadline = Instant::now() + Duration::from_secs(self.config.model_wait_secs);

        info!("Waiting for Ollama models to become available");
        loop {
            let models = self.registry.list_models().await;
            if !models.is_empty() {
                info!(models = ?models, "Models available");
                return models;
            }
            if Instant::now() + poll > deadline {
                break;
            }
            tokio::time::sleep(poll).await;
        }

        warn!(
            waited_secs = self.config.model_wait_secs,
            "No models found after waiting, starting with empty list"
        );
        Vec::new()
    }

    /// Load `model` into memory; failures are logged and ignored
    #[instrument(skip(self), fields(model = %model))]
    pub async fn preload(&self, model: &ModelName) {
        info!("Preloading model");
        let start = Instant::now();
        match self.generation.preload(model).await {
            Ok(()) => info!(
                elapsed_secs = %format!("{:.1}", start.elapsed().as_secs_f32()),
                "Model preloaded"
            ),
            Err(e) => warn!(error = %e, "Preload failed"),
        }
    }
}
