pub mod auth;
pub mod deployment_handlers;
pub mod error;
pub mod execution_handlers;
pub mod model_handlers;
pub mod routes;
pub mod state;
pub mod user_handlers;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, TokenConfig};
