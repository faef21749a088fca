//! Chat session state machine
//!
//! Holds everything one browser session sees: transcript, model catalog,
//! temperature and pull status. Pure state; the async plumbing that feeds it
//! fragments and progress lives in the application layer.
//!
//! Each user turn moves `Idle → Sending → Streaming → Idle`, or through
//! `Error` back to `Idle`. Every turn and every clear bumps the epoch, so work
//! started before a clear can be recognised and dropped.

use serde::{Deserialize, Serialize};

use super::{Fragment, GenerationRequest, ModelCatalog, PullOutcome, PullProgress, Transcript};
use crate::{
    errors::DomainError,
    value_objects::{ModelName, Temperature},
};

/// Where the current user turn is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Ready for input
    #[default]
    Idle,
    /// Request sent, no fragment yet
    Sending,
    /// Fragments arriving
    Streaming,
    /// Stream reported an error; returns to idle once it ends
    Error,
}

impl TurnState {
    /// Whether a turn is in flight
    pub const fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// A turn accepted by [`ChatSession::submit`] that still has to be streamed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    /// Epoch that fragments for this turn must carry
    pub epoch: u64,
    /// Request to send
    pub request: GenerationRequest,
}

/// Result of submitting a message
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input, nothing changed
    Ignored,
    /// Another turn is still in flight
    Busy,
    /// No model is selected
    NoModel,
    /// User turn appended; stream the pending request
    Started(PendingTurn),
}

/// State of one chat session
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    transcript: Transcript,
    catalog: ModelCatalog,
    temperature: Temperature,
    state: TurnState,
    epoch: u64,
    pull: Option<PullProgress>,
    pulling: Option<String>,
}

impl ChatSession {
    /// Create a session over an initial catalog
    pub fn new(catalog: ModelCatalog, temperature: Temperature) -> Self {
        Self {
            catalog,
            temperature,
            ..Self::default()
        }
    }

    /// Accept a user message.
    ///
    /// Blank input is ignored without touching state.
    pub fn submit(&mut self, message: &str) -> SubmitOutcome {
        let message = message.trim();
        if message.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.state.is_busy() {
            return SubmitOutcome::Busy;
        }
        let Some(model) = self.catalog.selected_model() else {
            return SubmitOutcome::NoModel;
        };

        self.transcript.push_user(message);
        self.state = TurnState::Sending;
        self.epoch += 1;

        SubmitOutcome::Started(PendingTurn {
            epoch: self.epoch,
            request: GenerationRequest::streaming(model, message, self.temperature),
        })
    }

    /// Apply a fragment for the turn started at `epoch`.
    ///
    /// Returns `false` and leaves the transcript untouched when the fragment
    /// belongs to a superseded turn.
    pub fn apply_fragment(&mut self, epoch: u64, fragment: &Fragment) -> bool {
        if epoch != self.epoch || !self.state.is_busy() {
            return false;
        }
        if self.state == TurnState::Sending {
            self.transcript.open_assistant();
            self.state = TurnState::Streaming;
        }
        self.transcript.append_assistant(fragment.as_str());
        if fragment.is_error() {
            self.state = TurnState::Error;
        }
        true
    }

    /// Mark the stream for `epoch` as ended
    pub fn finish_turn(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || !self.state.is_busy() {
            return false;
        }
        self.state = TurnState::Idle;
        true
    }

    /// Empty the transcript and abandon any in-flight turn
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.state = TurnState::Idle;
        self.epoch += 1;
    }

    /// Select a listed model
    pub fn select_model(&mut self, name: &str) -> Result<(), DomainError> {
        self.catalog.select(name)
    }

    /// Set the sampling temperature for subsequent turns
    pub fn set_temperature(&mut self, temperature: Temperature) {
        self.temperature = temperature;
    }

    /// Replace the model listing
    pub fn replace_models(&mut self, models: Vec<String>, focus: Option<&str>) {
        self.catalog.replace(models, focus);
    }

    /// Start tracking a pull; `false` if one is already running
    pub fn begin_pull(&mut self, model: &ModelName) -> bool {
        if self.pulling.is_some() {
            return false;
        }
        self.pulling = Some(model.to_string());
        self.pull = Some(PullProgress::started(model.as_str()));
        true
    }

    /// Record progress for the running pull, never moving backwards
    pub fn record_pull_progress(&mut self, progress: PullProgress) -> bool {
        if self.pulling.is_none() {
            return false;
        }
        let fraction = self
            .pull
            .as_ref()
            .map_or(progress.fraction, |p| p.fraction.max(progress.fraction));
        self.pull = Some(PullProgress {
            fraction,
            status: progress.status,
        });
        true
    }

    /// Finish the running pull; returns the pulled model's name
    pub fn finish_pull(&mut self, outcome: &PullOutcome) -> Option<String> {
        let model = self.pulling.take()?;
        let fraction = self.pull.as_ref().map_or(0.0, |p| p.fraction);
        self.pull = Some(if outcome.is_success() {
            PullProgress::complete(&model)
        } else {
            PullProgress::failed(&model, fraction)
        });
        Some(model)
    }

    /// Conversation so far
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Model listing and selection
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Current temperature
    pub const fn temperature(&self) -> Temperature {
        self.temperature
    }

    /// Current turn state
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Latest pull progress, if a pull has run
    pub fn pull_progress(&self) -> Option<&PullProgress> {
        self.pull.as_ref()
    }

    /// Name of the model being pulled
    pub fn pulling(&self) -> Option<&str> {
        self.pulling.as_deref()
    }
}
