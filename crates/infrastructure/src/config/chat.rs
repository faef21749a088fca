//! Chat session and pull configuration.

use application::{PullConfig, SessionConfig, StreamerConfig};
use serde::{Deserialize, Serialize};

/// Per-session chat settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Selection, temperature and channel sizes
    #[serde(flatten)]
    pub session: SessionConfig,

    /// Rendering of streamed text
    #[serde(flatten)]
    pub rendering: StreamerConfig,
}

/// Model pull settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullAppConfig {
    /// Program and leading arguments; the model name is appended
    #[serde(default = "default_pull_command")]
    pub command: Vec<String>,

    /// Progress reporting and registry polling
    #[serde(flatten)]
    pub progress: PullConfig,
}

fn default_pull_command() -> Vec<String> {
    vec!["ollama".to_string(), "pull".to_string()]
}

impl Default for PullAppConfig {
    fn default() -> Self {
        Self {
            command: default_pull_command(),
            progress: PullConfig::default(),
        }
    }
}
