//! Session commands
//!
//! Every user action in the chat UI becomes one of these and is handed to the
//! session controller.

use serde::{Deserialize, Serialize};

/// A user action against one chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Send a message to the selected model
    Submit { message: String },
    /// Switch to another listed model
    SelectModel { model: String },
    /// Change the sampling temperature
    SetTemperature { temperature: f32 },
    /// Re-query the registry
    RefreshModels,
    /// Download a model
    PullModel { model: String },
    /// Empty the transcript
    Clear,
}

impl SessionCommand {
    /// Short name used in logs
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::SelectModel { .. } => "select_model",
            Self::SetTemperature { .. } => "set_temperature",
            Self::RefreshModels => "refresh_models",
            Self::PullModel { .. } => "pull_model",
            Self::Clear => "clear",
        }
    }
}
