use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;
use uuid::Uuid;

use crate::{auth::repo_types::User, error::AppError, state::AppState};

/// The authenticated user behind the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Validates the bearer token and resolves it to a live user.
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("Authorization header missing".into()))?;

        let token = bearer_token(header).ok_or_else(|| {
            AppError::Unauthenticated("Invalid Authorization header format".into())
        })?;

        let claims = state.jwt.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthenticated("Invalid or expired token".into())
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await
            .map_err(AppError::upstream("Failed to resolve user"))?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for unknown user");
                AppError::Unauthenticated("User not found".into())
            })?;

        Ok(AuthUser(user.into()))
    }
}

/// Expects exactly `Bearer <token>`.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}
