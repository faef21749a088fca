//! Pull process port
//!
//! Defines how the model puller launches and observes the external download
//! command.

use async_trait::async_trait;
use domain::ModelName;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Exit status of a finished pull command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    /// Whether the command exited with code 0
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// A running pull command
#[async_trait]
pub trait PullProcess: Send {
    /// Next line of combined output, or `None` once output is closed.
    ///
    /// Must be cancel safe: a dropped call loses no line.
    async fn next_line(&mut self) -> Option<String>;

    /// Wait for the command to exit and reap it
    async fn wait(&mut self) -> Result<ProcessExit, ApplicationError>;
}

/// Port for launching pull commands
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PullProcessPort: Send + Sync {
    /// Start downloading `model`
    async fn spawn(&self, model: &ModelName) -> Result<Box<dyn PullProcess>, ApplicationError>;
}
