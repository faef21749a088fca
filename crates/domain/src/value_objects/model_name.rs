//! Model name value object

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Separator between a model's base name and its version tag (`llama3:8b`)
pub const TAG_SEPARATOR: char = ':';

/// Name (and optional tag) of a model known to the inference server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName(String);

impl ModelName {
    /// Parse a model name, trimming surrounding whitespace
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidModelName(raw.to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidModelName(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Full name including the tag, if any
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the version tag
    pub fn base(&self) -> &str {
        base_of(&self.0)
    }

    /// Whether this model shows up in a registry listing.
    ///
    /// Matches either the exact name or, failing that, the base name of any
    /// listed model (the registry may report `llama3:latest` for `llama3`).
    pub fn is_listed_in<S: AsRef<str>>(&self, listing: &[S]) -> bool {
        listing.iter().any(|name| name.as_ref() == self.0)
            || listing.iter().any(|name| base_of(name.as_ref()) == self.base())
    }
}

/// Portion of a model name before the tag separator
pub fn base_of(name: &str) -> &str {
    name.split(TAG_SEPARATOR).next().unwrap_or(name)
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelName> for String {
    fn from(name: ModelName) -> Self {
        name.0
    }
}
