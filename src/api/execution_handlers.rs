use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::logic::reconcile_execution;
use crate::model::{now, Execution, ExecutionStatus, Id, NewExecution};
use crate::store::traits::{ExecutionFilter, Page, Store};

const RESULTS_BUCKET: &str = "results";
const RESULT_URL_EXPIRES_SECS: u64 = 3600;

#[derive(Debug, Serialize)]
pub struct ExecutionStatusResponse {
    pub execution_id: Id,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub execution_id: Id,
    pub status: String,
    pub message: String,
}

pub async fn list_executions<S: Store>(
    State(state): State<AppState<S>>,
    Query(filter): Query<ExecutionFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Execution>>> {
    let executions = state.store.list_executions(filter, page).await?;
    Ok(Json(executions))
}

pub async fn get_execution<S: Store>(
    State(state): State<AppState<S>>,
    Path(execution_id): Path<Id>,
) -> ApiResult<Json<Execution>> {
    let execution = state
        .store
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Execution not found"))?;
    Ok(Json(execution))
}

/// Create an execution and trigger its parent deployment's workflow.
///
/// Persisted as queued before the trigger. On a successful trigger the
/// record moves to running with a start_time; on a failed trigger it moves
/// to failed with the error recorded in its logs, and the failure surfaces.
pub async fn create_execution<S: Store>(
    State(state): State<AppState<S>>,
    Json(new_execution): Json<NewExecution>,
) -> ApiResult<(StatusCode, Json<Execution>)> {
    let deployment = state
        .store
        .get_deployment(&new_execution.deployment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Deployment not found"))?;

    // Model delete does not cascade, so the parent deployment may reference
    // a model that no longer exists.
    state
        .store
        .get_model(&deployment.model_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Model not found"))?;

    let mut execution = new_execution.into_execution(deployment.model_id.clone());
    state.store.insert_execution(execution.clone()).await?;

    match state
        .orchestrator
        .trigger_run(&deployment.dag_id, execution.run_conf())
        .await
    {
        Ok(()) => {
            execution.status = ExecutionStatus::Running;
            execution.start_time = Some(now());
            state.store.update_execution(execution.clone()).await?;
            Ok((StatusCode::CREATED, Json(execution)))
        }
        Err(e) => {
            execution.status = ExecutionStatus::Failed;
            execution.end_time = Some(now());
            execution
                .logs
                .push(format!("Error triggering execution: {e}"));
            state.store.update_execution(execution.clone()).await?;
            Err(ApiError::upstream(format!(
                "Failed to trigger execution workflow: {e}"
            )))
        }
    }
}

/// Report an execution's status, refreshed against the orchestrator via the
/// parent deployment's run identifier.
pub async fn get_execution_status<S: Store>(
    State(state): State<AppState<S>>,
    Path(execution_id): Path<Id>,
) -> ApiResult<Json<ExecutionStatusResponse>> {
    let execution = state
        .store
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Execution not found"))?;

    let dag_id = state
        .store
        .get_deployment(&execution.deployment_id)
        .await?
        .map(|deployment| deployment.dag_id);

    let (execution, _) = reconcile_execution(
        state.store.as_ref(),
        state.orchestrator.as_ref(),
        execution,
        dag_id.as_deref(),
    )
    .await;

    Ok(Json(ExecutionStatusResponse {
        execution_id: execution.id,
        status: execution.status,
        start_time: execution.start_time,
        end_time: execution.end_time,
    }))
}

/// The execution's log lines, as a bare list.
pub async fn get_execution_logs<S: Store>(
    State(state): State<AppState<S>>,
    Path(execution_id): Path<Id>,
) -> ApiResult<Json<Vec<String>>> {
    let execution = state
        .store
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Execution not found"))?;

    Ok(Json(execution.logs))
}

/// Presigned link to the execution's result artifact. Only a successful
/// execution with a recorded result path has one.
pub async fn get_execution_results<S: Store>(
    State(state): State<AppState<S>>,
    Path(execution_id): Path<Id>,
) -> ApiResult<Json<ResultsResponse>> {
    let execution = state
        .store
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Execution not found"))?;

    let result_path = execution
        .result_path
        .ok_or_else(|| ApiError::not_found("No results available for this execution"))?;

    if execution.status != ExecutionStatus::Success {
        return Err(ApiError::invalid_state(
            "Execution has not completed successfully",
        ));
    }

    let download_url = state
        .artifacts
        .presigned_get_url(RESULTS_BUCKET, &result_path, RESULT_URL_EXPIRES_SECS)
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to generate results URL: {e}")))?;

    Ok(Json(ResultsResponse { download_url }))
}

/// Cancel an execution locally. The record is marked failed with an end
/// time and a log line; the remote workflow keeps running.
pub async fn cancel_execution<S: Store>(
    State(state): State<AppState<S>>,
    Path(execution_id): Path<Id>,
) -> ApiResult<Json<CancelResponse>> {
    let mut execution = state
        .store
        .get_execution(&execution_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Execution not found"))?;

    execution.cancel().map_err(ApiError::invalid_state)?;
    state.store.update_execution(execution.clone()).await?;

    Ok(Json(CancelResponse {
        execution_id: execution.id,
        status: "cancelled".to_string(),
        message: "Execution cancelled by user".to_string(),
    }))
}
