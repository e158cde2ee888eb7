use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::logic::reconcile_deployment;
use crate::model::{now, Deployment, DeploymentStatus, DeploymentUpdate, Id, NewDeployment};
use crate::store::traits::{DeploymentFilter, Page, Store};

#[derive(Debug, Serialize)]
pub struct DeploymentStatusResponse {
    pub deployment_id: Id,
    pub status: DeploymentStatus,
    pub updated_at: DateTime<Utc>,
}

pub async fn list_deployments<S: Store>(
    State(state): State<AppState<S>>,
    Query(filter): Query<DeploymentFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Deployment>>> {
    let deployments = state.store.list_deployments(filter, page).await?;
    Ok(Json(deployments))
}

pub async fn get_deployment<S: Store>(
    State(state): State<AppState<S>>,
    Path(deployment_id): Path<Id>,
) -> ApiResult<Json<Deployment>> {
    let deployment = state
        .store
        .get_deployment(&deployment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deployment not found"))?;
    Ok(Json(deployment))
}

/// Create a deployment and trigger its workflow.
///
/// The record is persisted as pending before the trigger, so a crash between
/// the two leaves an inspectable record rather than an untracked run. A
/// failed trigger flips the record to failed and surfaces the failure.
pub async fn create_deployment<S: Store>(
    State(state): State<AppState<S>>,
    Json(new_deployment): Json<NewDeployment>,
) -> ApiResult<(StatusCode, Json<Deployment>)> {
    state
        .store
        .get_model(&new_deployment.model_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Model not found"))?;

    let mut deployment = new_deployment.into_deployment();
    state.store.insert_deployment(deployment.clone()).await?;

    match state
        .orchestrator
        .trigger_run(&deployment.dag_id, deployment.run_conf())
        .await
    {
        Ok(()) => {
            deployment.status = DeploymentStatus::Running;
            deployment.updated_at = now();
            state.store.update_deployment(deployment.clone()).await?;
            Ok((StatusCode::CREATED, Json(deployment)))
        }
        Err(e) => {
            deployment.status = DeploymentStatus::Failed;
            deployment.updated_at = now();
            state.store.update_deployment(deployment.clone()).await?;
            Err(ApiError::upstream(format!(
                "Failed to trigger deployment workflow: {e}"
            )))
        }
    }
}

pub async fn update_deployment<S: Store>(
    State(state): State<AppState<S>>,
    Path(deployment_id): Path<Id>,
    Json(update): Json<DeploymentUpdate>,
) -> ApiResult<Json<Deployment>> {
    let mut deployment = state
        .store
        .get_deployment(&deployment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deployment not found"))?;

    deployment
        .apply_update(update)
        .map_err(ApiError::invalid_state)?;
    state.store.update_deployment(deployment.clone()).await?;
    Ok(Json(deployment))
}

/// Delete a deployment. Refused while executions reference it, so execution
/// history never loses its parent.
pub async fn delete_deployment<S: Store>(
    State(state): State<AppState<S>>,
    Path(deployment_id): Path<Id>,
) -> ApiResult<StatusCode> {
    state
        .store
        .get_deployment(&deployment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deployment not found"))?;

    if state.store.deployment_has_executions(&deployment_id).await? {
        return Err(ApiError::conflict(
            "Deployment has executions; delete them first",
        ));
    }

    state.store.delete_deployment(&deployment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-trigger a deployment's workflow. Rejected while a run is already in
/// flight; the stored dag_id is reused so the orchestrator sees the same
/// workflow across restarts.
pub async fn start_deployment<S: Store>(
    State(state): State<AppState<S>>,
    Path(deployment_id): Path<Id>,
) -> ApiResult<Json<Deployment>> {
    let mut deployment = state
        .store
        .get_deployment(&deployment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deployment not found"))?;

    if deployment.status == DeploymentStatus::Running {
        return Err(ApiError::invalid_state("Deployment is already running"));
    }

    state
        .orchestrator
        .trigger_run(&deployment.dag_id, deployment.run_conf())
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to trigger deployment workflow: {e}")))?;

    deployment.status = DeploymentStatus::Running;
    deployment.updated_at = now();
    state.store.update_deployment(deployment.clone()).await?;
    Ok(Json(deployment))
}

/// Report a deployment's status, refreshed against the orchestrator first.
pub async fn get_deployment_status<S: Store>(
    State(state): State<AppState<S>>,
    Path(deployment_id): Path<Id>,
) -> ApiResult<Json<DeploymentStatusResponse>> {
    let deployment = state
        .store
        .get_deployment(&deployment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deployment not found"))?;

    let (deployment, _) =
        reconcile_deployment(state.store.as_ref(), state.orchestrator.as_ref(), deployment).await;

    Ok(Json(DeploymentStatusResponse {
        deployment_id: deployment.id,
        status: deployment.status,
        updated_at: deployment.updated_at,
    }))
}
