//! Application services - Use case implementations

mod model_puller;
mod model_registry;
mod response_streamer;
mod session_controller;
mod warmup;

pub use model_puller::{
    MISSING_MODEL_NAME, ModelPuller, ProgressTracker, PullConfig, advance_progress,
    extract_progress,
};
pub use model_registry::ModelRegistryClient;
pub use response_streamer::{FragmentStream, ResponseStreamer, StreamerConfig};
pub use session_controller::{SessionConfig, SessionController, SessionServices};
pub use warmup::{StartupConfig, WarmupService};
