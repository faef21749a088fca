//! Infrastructure layer - Adapters for external systems
//!
//! Implements ports defined in the application layer: the Ollama HTTP API
//! and the model download command. Also owns configuration loading and the
//! tracing setup.

pub mod adapters;
pub mod config;
pub mod telemetry;

pub use adapters::*;
pub use config::{AppConfig, ChatConfig, ConfigError, LogFormat, PullAppConfig, ServerConfig};
pub use telemetry::{default_filter, init_tracing};
