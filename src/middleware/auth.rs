use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::AuthError;
use crate::domain::Principal;
use crate::error::AppError;
use crate::AppState;

/// Caller resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Principal);

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        match state.accounts.authenticate(token).await {
            Ok(principal) => Ok(AuthUser(principal)),
            Err(e) => {
                tracing::warn!(uri = %parts.uri, error = %e, "Rejected bearer token");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(AppError::Forbidden("Not authorized as an admin".to_string()));
        }
        Ok(AdminUser(principal))
    }
}
