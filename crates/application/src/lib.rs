//! Application layer - Use cases and orchestration
//!
//! Contains the chat session controller and the three services it drives:
//! registry queries, response streaming and model pulls. External systems
//! are reached through ports implemented in the infrastructure layer.

pub mod error;
pub mod ports;
pub mod services;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
