use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::{create_access_token, CurrentUser};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{Id, NewUser, UserResponse, UserRole, UserUpdate};
use crate::store::traits::{Page, Store};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Exchange credentials for a bearer token. A deliberately uniform 401 on
/// unknown username or wrong password.
pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .store
        .get_user_by_username(&request.username)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Incorrect username or password"))?;

    let verified = bcrypt::verify(&request.password, &user.hashed_password)
        .map_err(|_| ApiError::unauthorized("Incorrect username or password"))?;
    if !verified {
        return Err(ApiError::unauthorized("Incorrect username or password"));
    }

    let access_token = create_access_token(&state.tokens, &user)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub async fn get_current_user<S: Store>(
    CurrentUser(user): CurrentUser,
    State(_state): State<AppState<S>>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(user.into()))
}

pub async fn list_users<S: Store>(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState<S>>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    require_admin(&caller)?;
    let users = state.store.list_users(page).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Register a user. Admin only; usernames are unique.
pub async fn create_user<S: Store>(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState<S>>,
    Json(new_user): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    require_admin(&caller)?;

    if state
        .store
        .get_user_by_username(&new_user.username)
        .await?
        .is_some()
    {
        return Err(ApiError::invalid_state("Username already registered"));
    }

    let hashed_password = bcrypt::hash(&new_user.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to hash password: {e}")))?;
    let user = new_user.into_user(hashed_password);
    state.store.insert_user(user.clone()).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Update a user. Admins may update anyone; others only themselves, and
/// never their own role.
pub async fn update_user<S: Store>(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState<S>>,
    Path(user_id): Path<Id>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<Json<UserResponse>> {
    if caller.role != UserRole::Admin {
        if caller.id != user_id {
            return Err(ApiError::forbidden("Operation not permitted"));
        }
        if update.role.is_some() {
            return Err(ApiError::forbidden("Only admins may change roles"));
        }
    }

    let mut user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    user.apply_update(update);
    state.store.update_user(user.clone()).await?;
    Ok(Json(user.into()))
}

/// Delete a user. Admin only; an admin cannot delete their own account.
pub async fn delete_user<S: Store>(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState<S>>,
    Path(user_id): Path<Id>,
) -> ApiResult<StatusCode> {
    require_admin(&caller)?;

    if caller.id == user_id {
        return Err(ApiError::invalid_state("Users cannot delete themselves"));
    }

    let deleted = state.store.delete_user(&user_id).await?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn require_admin(caller: &crate::model::User) -> Result<(), ApiError> {
    if caller.role != UserRole::Admin {
        return Err(ApiError::forbidden("Operation not permitted"));
    }
    Ok(())
}
