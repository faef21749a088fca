//! Domain entities

mod chat_message;
mod chat_session;
mod fragment;
mod generation_request;
mod model_catalog;
mod pull_progress;
mod transcript;

pub use chat_message::{ChatMessage, MessageRole};
pub use chat_session::{ChatSession, PendingTurn, SubmitOutcome, TurnState};
pub use fragment::Fragment;
pub use generation_request::GenerationRequest;
pub use model_catalog::ModelCatalog;
pub use pull_progress::{PullOutcome, PullProgress};
pub use transcript::Transcript;
