//! Status API served over the mock exchange.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use cb0t::dashboard::{build_router, DashboardState};
use cb0t::engine::{AccumulationOrchestrator, CycleTrigger};
use cb0t::environment::StaticEnvironment;
use cb0t::strategy::StrategyConfig;
use cb0t::types::{AssetPairConfig, Environment};

use crate::mock_exchange::{MockExchange, BOTTOM};

async fn get(state: Arc<DashboardState>, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn state(exchange: Arc<MockExchange>) -> Arc<DashboardState> {
    Arc::new(DashboardState::new(
        exchange.clone(),
        exchange,
        Arc::new(StaticEnvironment(Environment::Prod)),
    ))
}

#[tokio::test]
async fn test_ticker_and_balance() {
    let exchange = Arc::new(MockExchange::new().with_market("XXBTZEUR", &BOTTOM, dec!(30000)));
    let state = state(exchange.clone());

    let (status, ticker) = get(state.clone(), "/api/ticker?pair=XXBTZEUR").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticker["pair"], "XXBTZEUR");
    assert_eq!(ticker["price"].as_f64(), Some(30000.0));

    let (status, _) = get(state.clone(), "/api/ticker?pair=NOPEEUR").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, balance) = get(state.clone(), "/api/balance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["ZEUR"].as_f64(), Some(250.0));

    let (_, env) = get(state, "/api/env").await;
    assert_eq!(env["environment"], "PROD");
}

#[tokio::test]
async fn test_cycles_reflect_recorded_reports() {
    let exchange = Arc::new(MockExchange::new().with_market("XXBTZEUR", &BOTTOM, dec!(30000)));
    let state = state(exchange.clone());
    let orch = AccumulationOrchestrator::new(
        exchange.clone(),
        exchange,
        Arc::new(StaticEnvironment(Environment::Prod)),
        &StrategyConfig::default(),
        Duration::from_secs(5),
    );

    let pairs = [AssetPairConfig::new("XXBTZEUR", dec!(4))];
    for _ in 0..3 {
        let report = orch.run_cycle(&pairs, CycleTrigger::on_time()).await;
        state.record_cycle(report).await;
    }

    let (status, cycles) = get(state, "/api/cycles").await;
    assert_eq!(status, StatusCode::OK);
    let cycles = cycles.as_array().unwrap();
    assert_eq!(cycles.len(), 3);
    assert_eq!(cycles[0]["executed"], 1);
    assert_eq!(cycles[0]["outcomes"][0]["outcome"]["kind"], "executed");
    assert!(cycles[0]["outcomes"][0]["outcome"]["transaction_id"]
        .as_str()
        .unwrap()
        .starts_with("MOCK-TX-"));
}
