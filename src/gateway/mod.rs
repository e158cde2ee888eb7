pub mod artifacts;
pub mod orchestrator;

pub use artifacts::*;
pub use orchestrator::*;
