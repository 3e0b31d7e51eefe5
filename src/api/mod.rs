//! Thin HTTP surface: a health check plus a handful of handlers that do
//! nothing but deserialize, call into `MatchingEngine`, and serialize the
//! result. No business logic lives here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{NewOrder, Side};
use crate::services::matching::MatchingEngine;
use crate::utils::response::{ApiResponse, AppError};

pub struct AppState {
    pub engine: Arc<MatchingEngine>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/markets/:market_id/orders", post(place_order))
        .route(
            "/markets/:market_id/orders/:order_id",
            get(get_order).delete(cancel_order),
        )
        .route("/markets/:market_id/orderbook", get(get_order_book))
        .route("/markets/:market_id/trades", get(recent_trades))
        .with_state(state)
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(new_order): Json<NewOrder>,
) -> Result<Json<ApiResponse<crate::services::matching::MatchingResult>>, AppError> {
    let result = state.engine.place_order(market_id, new_order).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderQuery {
    pub side: Side,
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path((market_id, order_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<CancelOrderQuery>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    let cancelled = state.engine.cancel_order(market_id, order_id, query.side).await?;
    Ok(Json(ApiResponse::success(cancelled)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path((market_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<crate::models::Order>>, AppError> {
    let order = state.engine.get_order(market_id, order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn get_order_book(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::cache::OrderBookView>>, AppError> {
    let book = state.engine.get_order_book(market_id).await?;
    Ok(Json(ApiResponse::success(book)))
}

#[derive(Debug, Deserialize)]
pub struct RecentTradesQuery {
    #[serde(default = "default_trade_limit")]
    pub limit: i64,
}

fn default_trade_limit() -> i64 {
    50
}

async fn recent_trades(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<RecentTradesQuery>,
) -> Result<Json<ApiResponse<Vec<crate::models::Trade>>>, AppError> {
    let trades = state.engine.recent_trades(market_id, query.limit).await?;
    Ok(Json(ApiResponse::success(trades)))
}
