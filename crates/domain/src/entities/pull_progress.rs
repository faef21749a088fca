//! Model pull progress and outcome

use serde::{Deserialize, Serialize};

/// Snapshot of a running pull, as shown in the progress indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullProgress {
    /// Completion in `[0.0, 1.0]`
    pub fraction: f32,
    /// Human-readable status line
    pub status: String,
}

impl PullProgress {
    /// Progress at the start of a pull
    pub fn started(model: &str) -> Self {
        Self {
            fraction: 0.0,
            status: format!("Starting pull: {model}"),
        }
    }

    /// Progress while downloading
    pub fn pulling(model: &str, fraction: f32) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        Self {
            fraction,
            status: format!("Pulling {model}… {}%", percent(fraction)),
        }
    }

    /// Progress once the download command has succeeded
    pub fn complete(model: &str) -> Self {
        Self {
            fraction: 1.0,
            status: format!("Pull complete: {model}"),
        }
    }

    /// Final progress for a failed pull; keeps the last reported fraction
    pub fn failed(model: &str, fraction: f32) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            status: format!("Pull failed for {model}"),
        }
    }

    /// Whole percent, rounded down
    pub fn percent(&self) -> u8 {
        percent(self.fraction)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(fraction: f32) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).floor() as u8
}

/// Terminal status of one pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PullOutcome {
    /// Download finished and the model is listed by the registry
    Completed { model: String },
    /// Download finished but the registry has not listed the model yet
    CompletedNotVisible { model: String },
    /// Download did not finish
    Failed { message: String },
}

impl PullOutcome {
    /// Whether the download itself succeeded
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Status text for the user
    pub fn message(&self) -> String {
        match self {
            Self::Completed { model } => format!("Successfully pulled model '{model}'."),
            Self::CompletedNotVisible { model } => {
                format!("Model '{model}' pulled but not visible in /api/tags yet.")
            },
            Self::Failed { message } => message.clone(),
        }
    }
}
