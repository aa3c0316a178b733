//! Status API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::engine::CycleReport;
use crate::environment::EnvironmentSignal;
use crate::market::{AccountClient, PriceFeed};
use crate::types::Environment;

/// Cycle reports kept for `/api/cycles`.
pub const CYCLE_HISTORY: usize = 50;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub feed: Arc<dyn PriceFeed>,
    pub account: Arc<dyn AccountClient>,
    pub environment: Arc<dyn EnvironmentSignal>,
    pub cycles: RwLock<VecDeque<CycleReport>>,
}

impl DashboardState {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        account: Arc<dyn AccountClient>,
        environment: Arc<dyn EnvironmentSignal>,
    ) -> Self {
        Self {
            feed,
            account,
            environment,
            cycles: RwLock::new(VecDeque::with_capacity(CYCLE_HISTORY)),
        }
    }

    /// Append a finished cycle, dropping the oldest past the cap.
    pub async fn record_cycle(&self, report: CycleReport) {
        let mut cycles = self.cycles.write().await;
        if cycles.len() == CYCLE_HISTORY {
            cycles.pop_front();
        }
        cycles.push_back(report);
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TickerQuery {
    pub pair: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerResponse {
    pub pair: String,
    pub price: Decimal,
    pub ordermin: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvResponse {
    pub environment: Environment,
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/env
pub async fn get_env(State(state): State<AppState>) -> Json<EnvResponse> {
    Json(EnvResponse {
        environment: state.environment.current(),
    })
}

/// GET /api/ticker?pair=XXBTZEUR
pub async fn get_ticker(
    State(state): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> Result<Json<TickerResponse>, ApiError> {
    let pair = match query.pair.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return Err(ApiError::bad_request("missing query parameter: pair")),
    };

    let (price, ordermin) = tokio::try_join!(
        state.feed.current_price(&pair),
        state.feed.minimum_order_volume(&pair),
    )
    .map_err(|e| {
        warn!(pair = %pair, error = %e, "Ticker lookup failed");
        ApiError::bad_gateway(e.to_string())
    })?;

    Ok(Json(TickerResponse {
        pair,
        price,
        ordermin,
    }))
}

/// GET /api/balance
pub async fn get_balance(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, Decimal>>, ApiError> {
    let balances = state.account.balances().await.map_err(|e| {
        warn!(error = %e, "Balance lookup failed");
        ApiError::bad_gateway(e.to_string())
    })?;
    Ok(Json(balances))
}

/// GET /api/cycles
pub async fn get_cycles(State(state): State<AppState>) -> Json<Vec<CycleReport>> {
    let cycles = state.cycles.read().await;
    Json(cycles.iter().cloned().collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
