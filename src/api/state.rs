use std::sync::Arc;

use crate::gateway::{ArtifactStore, Orchestrator};

/// Token signing parameters shared by issuance and verification.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expire_minutes: i64,
}

/// Process-wide shared handles, created once at startup and injected into
/// every handler through router state.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub tokens: TokenConfig,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            orchestrator: Arc::clone(&self.orchestrator),
            artifacts: Arc::clone(&self.artifacts),
            tokens: self.tokens.clone(),
        }
    }
}
