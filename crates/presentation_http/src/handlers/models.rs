//! Model listing handler

use axum::{Json, extract::State};
use domain::ModelCatalog;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::state::AppState;

/// Live model listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Names reported by the Ollama server
    pub models: Vec<String>,
    /// Configured preferred model, listed or not
    pub preferred: Option<String>,
    /// Model a new session would start with
    pub selected: Option<String>,
}

/// List locally available models; empty when Ollama cannot be reached
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.registry().list_models().await;
    let preferred = state.services.config.preferred_model.clone();
    let catalog = ModelCatalog::with_models(preferred.clone(), models);

    Json(ModelsResponse {
        models: catalog.models().to_vec(),
        preferred,
        selected: catalog.selected().map(str::to_string),
    })
}
