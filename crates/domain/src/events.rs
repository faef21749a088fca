//! Session events
//!
//! Emitted by the session controller and consumed by whatever renders the
//! session.

use serde::{Deserialize, Serialize};

use crate::{
    entities::{ChatMessage, ChatSession, ModelCatalog, PullOutcome, PullProgress, TurnState},
    value_objects::Temperature,
};

/// Complete view of a session, sent when a subscriber attaches or falls behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: TurnState,
    pub transcript: Vec<ChatMessage>,
    pub catalog: ModelCatalog,
    pub temperature: Temperature,
    pub pull: Option<PullProgress>,
    pub pulling: Option<String>,
}

impl From<&ChatSession> for SessionSnapshot {
    fn from(session: &ChatSession) -> Self {
        Self {
            state: session.state(),
            transcript: session.transcript().messages().to_vec(),
            catalog: session.catalog().clone(),
            temperature: session.temperature(),
            pull: session.pull_progress().cloned(),
            pulling: session.pulling().map(str::to_string),
        }
    }
}

/// A state change a renderer should reflect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Full state
    Snapshot(SessionSnapshot),
    /// Turn state moved
    StateChanged { state: TurnState },
    /// Transcript content changed
    TranscriptChanged { messages: Vec<ChatMessage> },
    /// Model list or selection changed
    ModelsChanged {
        models: Vec<String>,
        selected: Option<String>,
    },
    /// Pull progress update
    PullProgress(PullProgress),
    /// Pull ended
    PullFinished { outcome: PullOutcome },
    /// Informational message for the user
    Notice { message: String },
}

impl SessionEvent {
    /// Event name, used as the SSE `event:` field
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::StateChanged { .. } => "state_changed",
            Self::TranscriptChanged { .. } => "transcript_changed",
            Self::ModelsChanged { .. } => "models_changed",
            Self::PullProgress(_) => "pull_progress",
            Self::PullFinished { .. } => "pull_finished",
            Self::Notice { .. } => "notice",
        }
    }

    /// Snapshot event for a session
    pub fn snapshot(session: &ChatSession) -> Self {
        Self::Snapshot(SessionSnapshot::from(session))
    }

    /// Model list event for a catalog
    pub fn models(catalog: &ModelCatalog) -> Self {
        Self::ModelsChanged {
            models: catalog.models().to_vec(),
            selected: catalog.selected().map(str::to_string),
        }
    }

    /// Notice event
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }
}
