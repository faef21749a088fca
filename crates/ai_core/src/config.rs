//! Configuration for the inference client

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Configuration for the Ollama client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for registry queries and blocking generation in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Total timeout for a streamed generation in milliseconds
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,

    /// Timeout for the warm-up generation that loads a model into memory
    #[serde(default = "default_preload_timeout_ms")]
    pub preload_timeout_ms: u64,

    /// Transport retry policy applied to every call
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

const fn default_stream_timeout_ms() -> u64 {
    600_000
}

const fn default_preload_timeout_ms() -> u64 {
    600_000
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            stream_timeout_ms: default_stream_timeout_ms(),
            preload_timeout_ms: default_preload_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl InferenceConfig {
    /// Config pointing at a specific server, defaults otherwise
    pub fn for_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Request timeout as a duration
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Stream timeout as a duration
    pub const fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    /// Preload timeout as a duration
    pub const fn preload_timeout(&self) -> Duration {
        Duration::from_millis(self.preload_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = InferenceConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.stream_timeout(), Duration::from_secs(600));
        assert_eq!(config.preload_timeout(), Duration::from_secs(600));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn deserialization_with_defaults() {
        let config: InferenceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn deserialization_overrides() {
        let json = r#"{"base_url":"http://gpu-box:11434","stream_timeout_ms":1000,"retry":{"max_retries":0}}"#;
        let config: InferenceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "http://gpu-box:11434");
        assert_eq!(config.stream_timeout_ms, 1000);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.retry_statuses, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn for_url_keeps_other_defaults() {
        let config = InferenceConfig::for_url("http://other:1");
        assert_eq!(config.base_url, "http://other:1");
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
