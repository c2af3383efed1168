pub mod admin;
pub mod crypto;
pub mod transactions;
pub mod users;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{Page, PageRequest};
use crate::error::AppError;
use crate::health::check_health;
use crate::validation::ValidationError;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = check_health(&state.health_checks, state.started_at).await;

    let status_code = if report.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(report))
}

/// `{"status":"success","data":...}`
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({ "status": "success", "message": message, "data": data })),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn to_request(&self) -> Result<PageRequest, ValidationError> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(PageRequest::DEFAULT_LIMIT);
        if page < 1 {
            return Err(ValidationError::new("page", "must be at least 1"));
        }
        if !(1..=PageRequest::MAX_LIMIT).contains(&limit) {
            return Err(ValidationError::new(
                "limit",
                format!("must be between 1 and {}", PageRequest::MAX_LIMIT),
            ));
        }
        Ok(PageRequest::new(page, limit))
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let limit = i64::from(request.limit);
        Self {
            total,
            page: request.page,
            limit: request.limit,
            pages: (total + limit - 1) / limit,
        }
    }
}

pub fn paginated<T: Serialize>(page: Page<T>, request: PageRequest) -> Json<Value> {
    success(json!({
        "transactions": page.items,
        "pagination": Pagination::new(page.total, request),
    }))
}

/// Unparseable ids cannot exist, so they are reported as not found.
pub fn parse_transaction_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound("Transaction not found".to_string()))
}
