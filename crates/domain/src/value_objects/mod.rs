//! Value Objects - Immutable, identity-less domain primitives

mod model_name;
mod session_id;
mod temperature;

pub use model_name::{ModelName, TAG_SEPARATOR, base_of};
pub use session_id::SessionId;
pub use temperature::Temperature;
