use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use super::success;
use crate::error::{ApiQuery, AppError};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopParams {
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// Live price; also recorded as a snapshot.
pub async fn current_price(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.prices.current_price().await?;
    Ok(success(json!({ "prices": snapshot })))
}

pub async fn price_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.prices.history(params.limit).await?;
    Ok(success(json!({ "count": history.len(), "history": history })))
}

pub async fn top_coins(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<TopParams>,
) -> Result<impl IntoResponse, AppError> {
    let coins = state.prices.top(params.limit, params.page).await?;
    Ok(success(json!({ "count": coins.len(), "coins": coins })))
}
