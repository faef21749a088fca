//! Domain layer for the Ollama chat UI
//!
//! Contains the transcript, model catalog and pull progress types together
//! with the commands and events exchanged with a chat session.
//! This layer has no I/O and defines the ubiquitous language.

pub mod commands;
pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;

pub use commands::SessionCommand;
pub use entities::*;
pub use errors::DomainError;
pub use events::{SessionEvent, SessionSnapshot};
pub use value_objects::*;
