use axum::{
    async_trait,
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRequest, FromRequestParts, Query},
    http::{request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::domain::QuoteError;
use crate::oracle::OracleError;
use crate::ports::RepositoryError;
use crate::services::proof_storage::StorageError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing message. Server-side failures get a generic text; the
    /// detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Upstream(_) => "Price service unavailable, please try again later".to_string(),
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::InvalidTransition { .. } => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "status": "error",
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(format!("Not found: {}", what)),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Corrupt(msg) => AppError::Internal(msg),
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<OracleError> for AppError {
    fn from(err: OracleError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::AmountOutOfRange { .. } => AppError::Validation(err.to_string()),
            QuoteError::InvalidPrice(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Rejected(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hashing(msg) | AuthError::Encoding(msg) => AppError::Internal(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

/// `Json` that reports malformed bodies in the standard error shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    B: axum::body::HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<axum::BoxError>,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

/// `Query` that reports malformed query strings in the standard error shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection: QueryRejection| AppError::BadRequest(rejection.body_text()))
    }
}
