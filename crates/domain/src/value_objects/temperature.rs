//! Sampling temperature

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Sampling temperature as offered by the chat UI slider
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Temperature(f32);

impl Temperature {
    /// Lowest accepted value
    pub const MIN: f32 = 0.0;
    /// Highest accepted value
    pub const MAX: f32 = 1.0;
    /// Value used when nothing else is configured
    pub const DEFAULT: Self = Self(0.7);

    /// Validate a temperature value
    pub fn new(value: f32) -> Result<Self, DomainError> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidTemperature {
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    /// Raw value
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f32> for Temperature {
    type Error = DomainError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Temperature> for f32 {
    fn from(t: Temperature) -> Self {
        t.0
    }
}
