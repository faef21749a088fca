//! Application configuration
//!
//! Split into focused sub-modules:
//! - `server`: HTTP server settings
//! - `chat`: session defaults, rendering and model pulls
//!
//! Sources are layered, later ones winning: built-in defaults, the TOML file,
//! `OLLAMA_CHAT_*` variables, then the well-known `DEFAULT_MODEL` and
//! `OLLAMA_MODELS` variables. CLI flags are applied by the binary on top.

mod chat;
mod server;

use std::{collections::HashMap, path::Path};

use ai_core::InferenceConfig;
use application::StartupConfig;
use domain::Temperature;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use chat::{ChatConfig, PullAppConfig};
pub use server::{LogFormat, ServerConfig};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "ollama-chat";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "OLLAMA_CHAT";

/// Variable naming the preferred initial model
pub const DEFAULT_MODEL_VAR: &str = "DEFAULT_MODEL";

/// Variable naming the Ollama models directory
pub const MODELS_DIR_VAR: &str = "OLLAMA_MODELS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values were read but make no sense together
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Ollama client configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Chat session configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Model pull configuration
    #[serde(default)]
    pub pull: PullAppConfig,

    /// Startup warm-up configuration
    #[serde(default)]
    pub startup: StartupConfig,

    /// Ollama models directory, informational only
    #[serde(default)]
    pub models_dir: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment and an optional file
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    /// Load configuration using `env` in place of the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load_with_env(
        path: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            // e.g. OLLAMA_CHAT_SERVER__PORT=8080
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("pull.command")
                    .try_parsing(true)
                    .source(Some(env.clone())),
            )
            .set_override_option(
                "chat.preferred_model",
                non_empty(env.get(DEFAULT_MODEL_VAR)),
            )?
            .set_override_option("models_dir", non_empty(env.get(MODELS_DIR_VAR)))?;

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("inference.base_url is empty".into()));
        }
        if self.pull.command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("pull.command is empty".into()));
        }
        if let Err(e) = Temperature::new(self.chat.session.default_temperature) {
            return Err(ConfigError::Invalid(format!("chat.default_temperature: {e}")));
        }
        if self.server.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.cleanup_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
