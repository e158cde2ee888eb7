use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::{AppState, TokenConfig};
use crate::model::{now, User, UserRole};
use crate::store::traits::Store;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the authenticated caller.
    pub sub: String,
    pub role: UserRole,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Issue a signed bearer token for the given user.
pub fn create_access_token(tokens: &TokenConfig, user: &User) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.username.clone(),
        role: user.role,
        exp: (now() + Duration::minutes(tokens.expire_minutes)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(tokens.secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to sign token: {e}")))
}

/// Decode and validate a bearer token, returning its claims.
pub fn decode_token(tokens: &TokenConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(tokens.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("Invalid credentials"))
}

/// Authenticated caller, resolved from the Authorization header.
///
/// Rejects with 401 on a missing/invalid/expired token or an unknown user,
/// and 400 on an inactive user.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Store + 'static> FromRequestParts<AppState<S>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing credentials"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        let claims = decode_token(&state.tokens, token)?;

        let user = state
            .store
            .get_user_by_username(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

        if !user.is_active {
            return Err(ApiError::invalid_state("Inactive user"));
        }

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;

    fn config() -> TokenConfig {
        TokenConfig {
            secret: "test-secret".to_string(),
            expire_minutes: 30,
        }
    }

    fn user() -> User {
        NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: None,
            department: None,
            region: None,
            password: "pw".to_string(),
            role: UserRole::Admin,
        }
        .into_user("hash".to_string())
    }

    #[test]
    fn test_token_round_trip() {
        let tokens = config();
        let token = create_access_token(&tokens, &user()).unwrap();
        let claims = decode_token(&tokens, &token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_access_token(&config(), &user()).unwrap();
        let other = TokenConfig {
            secret: "different".to_string(),
            expire_minutes: 30,
        };
        assert!(decode_token(&other, &token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenConfig {
            secret: "test-secret".to_string(),
            expire_minutes: -5,
        };
        let token = create_access_token(&tokens, &user()).unwrap();
        assert!(decode_token(&tokens, &token).is_err());
    }
}
