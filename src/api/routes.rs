use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::api::state::AppState;
use crate::api::{deployment_handlers, execution_handlers, model_handlers, user_handlers};
use crate::store::traits::Store;

/// Build the service router. Generic over the store so tests run the same
/// routing against the in-memory backend.
pub fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/models",
            get(model_handlers::list_models::<S>).post(model_handlers::create_model::<S>),
        )
        .route(
            "/models/:id",
            get(model_handlers::get_model::<S>)
                .put(model_handlers::update_model::<S>)
                .delete(model_handlers::delete_model::<S>),
        )
        .route("/models/:id/download", get(model_handlers::download_model::<S>))
        .route(
            "/deployments",
            get(deployment_handlers::list_deployments::<S>)
                .post(deployment_handlers::create_deployment::<S>),
        )
        .route(
            "/deployments/:id",
            get(deployment_handlers::get_deployment::<S>)
                .put(deployment_handlers::update_deployment::<S>)
                .delete(deployment_handlers::delete_deployment::<S>),
        )
        .route(
            "/deployments/:id/start",
            post(deployment_handlers::start_deployment::<S>),
        )
        .route(
            "/deployments/:id/status",
            get(deployment_handlers::get_deployment_status::<S>),
        )
        .route(
            "/executions",
            get(execution_handlers::list_executions::<S>)
                .post(execution_handlers::create_execution::<S>),
        )
        .route("/executions/:id", get(execution_handlers::get_execution::<S>))
        .route(
            "/executions/:id/status",
            get(execution_handlers::get_execution_status::<S>),
        )
        .route(
            "/executions/:id/logs",
            get(execution_handlers::get_execution_logs::<S>),
        )
        .route(
            "/executions/:id/results",
            get(execution_handlers::get_execution_results::<S>),
        )
        .route(
            "/executions/:id/cancel",
            post(execution_handlers::cancel_execution::<S>),
        )
        .route("/users/token", post(user_handlers::login::<S>))
        .route("/users/me", get(user_handlers::get_current_user::<S>))
        .route(
            "/users",
            get(user_handlers::list_users::<S>).post(user_handlers::create_user::<S>),
        )
        .route(
            "/users/:id",
            put(user_handlers::update_user::<S>).delete(user_handlers::delete_user::<S>),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "ML Platform API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Static connectivity report; no backing service is actually probed.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "services": {
            "database": "connected",
            "artifact_store": "connected",
            "orchestrator": "connected",
        },
    }))
}
