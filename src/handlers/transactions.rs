use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::{created, paginated, parse_transaction_id, success, PageParams};
use crate::domain::{BankDetails, TransactionFilter, TransactionStatus, TransactionType};
use crate::error::{ApiJson, ApiQuery, AppError};
use crate::middleware::auth::{AdminUser, AuthUser};
use crate::services::{ProofKind, ProofReceipt, ProofUpload};
use crate::validation::{
    parse_amount, parse_date, validate_asset_address, validate_bank_details, validate_date_range,
    validate_enum, validate_note, AmountInput, ValidationError, TRANSACTION_TYPES,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    pub lisk_amount: AmountInput,
    pub lisk_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    pub lisk_amount: AmountInput,
    pub bank_details: BankDetails,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AdminListParams {
    fn to_filter(&self) -> Result<TransactionFilter, ValidationError> {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_status)
            .transpose()?;

        let tx_type = match self.tx_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let raw = raw.to_ascii_lowercase();
                validate_enum("type", &raw, TRANSACTION_TYPES)?;
                raw.parse::<TransactionType>().ok()
            }
            None => None,
        };

        let start_date = self
            .start_date
            .as_deref()
            .map(|d| parse_date("startDate", d, false))
            .transpose()?;
        let end_date = self
            .end_date
            .as_deref()
            .map(|d| parse_date("endDate", d, true))
            .transpose()?;
        validate_date_range(start_date, end_date)?;

        Ok(TransactionFilter {
            user_id: None,
            status,
            tx_type,
            start_date,
            end_date,
        })
    }
}

fn parse_status(raw: &str) -> Result<TransactionStatus, ValidationError> {
    raw.parse::<TransactionStatus>().map_err(|_| {
        let allowed: Vec<&str> = TransactionStatus::ALL.iter().map(|s| s.as_str()).collect();
        ValidationError::new("status", format!("must be one of: {}", allowed.join(", ")))
    })
}

pub async fn create_buy_order(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ApiJson(body): ApiJson<BuyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = parse_amount("liskAmount", &body.lisk_amount)?;
    let address = body.lisk_address.trim().to_string();
    validate_asset_address("liskAddress", &address)?;

    let receipt = state
        .lifecycle
        .create_buy_order(&principal, amount, address)
        .await?;
    Ok(created("Buy order created successfully", receipt))
}

pub async fn create_sell_order(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ApiJson(body): ApiJson<SellRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = parse_amount("liskAmount", &body.lisk_amount)?;
    let bank_details = validate_bank_details(&body.bank_details)?;

    let receipt = state
        .lifecycle
        .create_sell_order(&principal, amount, bank_details)
        .await?;
    Ok(created("Sell order created successfully", receipt))
}

pub async fn my_transactions(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = params.to_request()?;
    let page = state.lifecycle.list_mine(&principal, request).await?;
    Ok(paginated(page, request))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_transaction_id(&id)?;
    let tx = state.lifecycle.get(&principal, id).await?;
    Ok(success(tx))
}

pub async fn upload_payment_proof(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    attach(state, principal, id, ProofKind::Payment, multipart).await
}

pub async fn upload_sell_proof(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    attach(state, principal, id, ProofKind::Sell, multipart).await
}

async fn attach(
    state: AppState,
    principal: crate::domain::Principal,
    id: String,
    kind: ProofKind,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_transaction_id(&id)?;
    let upload = read_file_field(multipart, kind.field_name())
        .await?
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let tx = state
        .lifecycle
        .attach_proof(&principal, id, kind, upload)
        .await?;
    Ok(success(ProofReceipt::new(kind, tx)))
}

/// First field named `field_name`; other fields are ignored.
async fn read_file_field(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<Option<ProofUpload>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        return Ok(Some(ProofUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_transaction_id(&id)?;
    let status = parse_status(&body.status)?;
    let note = validate_note(body.note.as_deref())?;

    let tx = state.lifecycle.update_status(id, status, note).await?;
    Ok(success(tx))
}

pub async fn list_all(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiQuery(params): ApiQuery<AdminListParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = params.to_filter()?;
    let request = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .to_request()?;

    let page = state.lifecycle.list_all(&filter, request).await?;
    Ok(paginated(page, request))
}
