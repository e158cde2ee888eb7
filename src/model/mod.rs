pub mod common;
pub mod deployment;
pub mod execution;
pub mod model;
pub mod user;

pub use common::*;
pub use deployment::*;
pub use execution::*;
pub use model::*;
pub use user::*;
