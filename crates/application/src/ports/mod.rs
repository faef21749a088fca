//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod generation_port;
mod model_registry_port;
mod pull_process_port;

#[cfg(test)]
pub use generation_port::MockGenerationPort;
pub use generation_port::{GenerationPort, TextStream};
#[cfg(test)]
pub use model_registry_port::MockModelRegistryPort;
pub use model_registry_port::ModelRegistryPort;
#[cfg(test)]
pub use pull_process_port::MockPullProcessPort;
pub use pull_process_port::{ProcessExit, PullProcess, PullProcessPort};
