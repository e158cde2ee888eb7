use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{Id, Model, ModelUpdate, NewModel};
use crate::store::traits::{ModelFilter, Page, Store};

const MODELS_BUCKET: &str = "models";
const DOWNLOAD_URL_EXPIRES_SECS: u64 = 3600;

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
}

pub async fn list_models<S: Store>(
    State(state): State<AppState<S>>,
    Query(filter): Query<ModelFilter>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Model>>> {
    let models = state.store.list_models(filter, page).await?;
    Ok(Json(models))
}

pub async fn get_model<S: Store>(
    State(state): State<AppState<S>>,
    Path(model_id): Path<Id>,
) -> ApiResult<Json<Model>> {
    let model = state
        .store
        .get_model(&model_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Model not found"))?;
    Ok(Json(model))
}

/// Register a model. Multipart: a `metadata` JSON part plus an optional
/// `file` binary part; the binary lands in the models bucket under
/// `{model_id}/{filename}`.
pub async fn create_model<S: Store>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Model>)> {
    let mut metadata: Option<NewModel> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_state(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid_state(format!("Unreadable metadata: {e}")))?;
                let new_model = serde_json::from_str(&text)
                    .map_err(|e| ApiError::invalid_state(format!("Invalid model metadata: {e}")))?;
                metadata = Some(new_model);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("model.bin")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_state(format!("Unreadable file part: {e}")))?;
                file = Some((filename, data.to_vec()));
            }
            _ => {}
        }
    }

    let new_model =
        metadata.ok_or_else(|| ApiError::invalid_state("Missing metadata part"))?;
    let mut model = new_model.into_model();
    state.store.insert_model(model.clone()).await?;

    if let Some((filename, data)) = file {
        let object_name = format!("{}/{}", model.id, filename);
        state
            .artifacts
            .upload(MODELS_BUCKET, &object_name, data)
            .await
            .map_err(|e| ApiError::upstream(format!("Failed to store model artifact: {e}")))?;
        model.file_path = Some(object_name);
        state.store.update_model(model.clone()).await?;
    }

    Ok((StatusCode::CREATED, Json(model)))
}

pub async fn update_model<S: Store>(
    State(state): State<AppState<S>>,
    Path(model_id): Path<Id>,
    Json(update): Json<ModelUpdate>,
) -> ApiResult<Json<Model>> {
    let mut model = state
        .store
        .get_model(&model_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Model not found"))?;

    model.apply_update(update);
    state.store.update_model(model.clone()).await?;
    Ok(Json(model))
}

/// Delete a model. Does not cascade to deployments; a deployment may be
/// left referencing a deleted model.
pub async fn delete_model<S: Store>(
    State(state): State<AppState<S>>,
    Path(model_id): Path<Id>,
) -> ApiResult<StatusCode> {
    let deleted = state.store.delete_model(&model_id).await?;
    if !deleted {
        return Err(ApiError::not_found("Model not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_model<S: Store>(
    State(state): State<AppState<S>>,
    Path(model_id): Path<Id>,
) -> ApiResult<Json<DownloadResponse>> {
    let model = state
        .store
        .get_model(&model_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Model not found"))?;

    let file_path = model
        .file_path
        .ok_or_else(|| ApiError::not_found("No file associated with this model"))?;

    let download_url = state
        .artifacts
        .presigned_get_url(MODELS_BUCKET, &file_path, DOWNLOAD_URL_EXPIRES_SECS)
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to generate download URL: {e}")))?;

    Ok(Json(DownloadResponse { download_url }))
}
