pub mod api;
pub mod config;
pub mod gateway;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::{create_router, ApiError, ApiResult, AppState, TokenConfig};

// Export gateway traits and implementations
pub use gateway::{
    AirflowOrchestrator, ArtifactStore, MemoryArtifactStore, Orchestrator, RunState,
    S3ArtifactStore,
};

// Export reconciliation core
pub use logic::{reconcile_deployment, reconcile_execution, RefreshOutcome};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};
