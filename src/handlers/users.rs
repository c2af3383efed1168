use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::success;
use crate::domain::{Principal, ProfileUpdate};
use crate::error::{ApiJson, AppError};
use crate::middleware::auth::AuthUser;
use crate::services::Registration;
use crate::validation::{
    validate_asset_address, validate_email, validate_password, validate_person_name,
    validate_required,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub lisk_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Only these fields may change through the profile endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub lisk_address: Option<String>,
}

fn optional_address(raw: Option<String>) -> Result<Option<String>, AppError> {
    match raw.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()) {
        Some(address) => {
            validate_asset_address("liskAddress", &address)?;
            Ok(Some(address))
        }
        None => Ok(None),
    }
}

fn require_user(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin() {
        return Err(AppError::Forbidden("Admin accounts have no user profile".to_string()));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = validate_email(&body.email)?;
    validate_password(&body.password)?;
    let first_name = validate_person_name("firstName", &body.first_name)?;
    let last_name = validate_person_name("lastName", &body.last_name)?;
    let asset_address = optional_address(body.lisk_address)?;

    let session = state
        .accounts
        .register(Registration {
            email,
            password: body.password,
            first_name,
            last_name,
            asset_address,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "token": session.token,
            "data": { "user": session.account },
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = body.email.trim().to_ascii_lowercase();
    validate_required("email", &email)?;
    validate_required("password", &body.password)?;

    let session = state.accounts.login(&email, &body.password).await?;
    Ok(Json(json!({
        "status": "success",
        "token": session.token,
        "data": { "user": session.account },
    })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    require_user(&principal)?;
    let user = state.accounts.profile(principal.id).await?;
    Ok(success(json!({ "user": user })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ApiJson(body): ApiJson<ProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_user(&principal)?;
    let update = ProfileUpdate {
        first_name: body
            .first_name
            .map(|n| validate_person_name("firstName", &n))
            .transpose()?,
        last_name: body
            .last_name
            .map(|n| validate_person_name("lastName", &n))
            .transpose()?,
        asset_address: optional_address(body.lisk_address)?,
    };

    let user = state.accounts.update_profile(principal.id, update).await?;
    Ok(success(json!({ "user": user })))
}
