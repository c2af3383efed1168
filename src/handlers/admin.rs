use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiJson, AppError};
use crate::validation::{validate_email, validate_password, validate_required};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

/// Creates the first admin account. Refused once one exists.
pub async fn initialize(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AdminCredentials>,
) -> Result<impl IntoResponse, AppError> {
    let email = validate_email(&body.email)?;
    validate_password(&body.password)?;

    let session = state.accounts.initialize_admin(email, body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "token": session.token,
            "data": { "admin": session.account },
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AdminCredentials>,
) -> Result<impl IntoResponse, AppError> {
    let email = body.email.trim().to_ascii_lowercase();
    validate_required("email", &email)?;
    validate_required("password", &body.password)?;

    let session = state.accounts.admin_login(&email, &body.password).await?;
    Ok(Json(json!({
        "status": "success",
        "token": session.token,
        "data": { "admin": session.account },
    })))
}
