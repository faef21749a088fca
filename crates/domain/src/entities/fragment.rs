//! Streamed response fragments

use serde::{Deserialize, Serialize};

/// One decoded text delta of a streamed generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Fragment {
    /// Generated text
    Text(String),
    /// Terminal, human-readable error; nothing follows it
    Error(String),
}

impl Fragment {
    /// Text to append to the transcript
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) | Self::Error(text) => text,
        }
    }

    /// Whether this fragment reports a failure
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
