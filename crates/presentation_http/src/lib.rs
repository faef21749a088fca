//! Ollama chat HTTP presentation layer
//!
//! Serves the chat page and a small JSON + Server-Sent Events API over the
//! chat session controller.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod tasks;

pub use error::ApiError;
pub use routes::create_router;
pub use server::serve;
pub use state::{AppState, SessionRegistry};
pub use tasks::spawn_session_cleanup_task;
