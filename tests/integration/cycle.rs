//! End-to-end cycles through the orchestrator and the mock exchange.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use cb0t::config::AppConfig;
use cb0t::engine::{AccumulationOrchestrator, CycleTrigger};
use cb0t::environment::{EnvVarSignal, EnvironmentSignal, StaticEnvironment};
use cb0t::strategy::StrategyConfig;
use cb0t::types::{AssetPairConfig, Environment, ExecutionError, Outcome, SkipReason};

use crate::mock_exchange::{MockExchange, BOTTOM, FALLING, RISING};

fn orchestrator(
    exchange: Arc<MockExchange>,
    environment: Arc<dyn EnvironmentSignal>,
) -> AccumulationOrchestrator {
    AccumulationOrchestrator::new(
        exchange.clone(),
        exchange,
        environment,
        &StrategyConfig::default(),
        Duration::from_secs(5),
    )
}

fn prod() -> Arc<dyn EnvironmentSignal> {
    Arc::new(StaticEnvironment(Environment::Prod))
}

fn dev() -> Arc<dyn EnvironmentSignal> {
    Arc::new(StaticEnvironment(Environment::Dev))
}

fn pairs() -> Vec<AssetPairConfig> {
    vec![
        AssetPairConfig::new("XXBTZEUR", dec!(4)),
        AssetPairConfig::new("XETHZEUR", dec!(4)),
        AssetPairConfig::new("SOLEUR", dec!(4)),
    ]
}

fn exchange() -> MockExchange {
    MockExchange::new()
        .with_market("XXBTZEUR", &BOTTOM, dec!(30000))
        .with_market("XETHZEUR", &RISING, dec!(2500))
        .with_market("SOLEUR", &FALLING, dec!(150))
}

#[tokio::test]
async fn test_prod_cycle_buys_favorable_pairs() {
    let exchange = Arc::new(exchange());
    let report = orchestrator(exchange.clone(), prod())
        .run_cycle(&pairs(), CycleTrigger::on_time())
        .await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.executed, 2);
    assert_eq!(report.skipped, 1);

    let orders = exchange.orders();
    assert_eq!(orders.len(), 2);
    for (pair, volume) in &orders {
        assert_ne!(pair, "SOLEUR");
        assert!(*volume >= dec!(0.0001));
        // Never more precise than 8 decimal places.
        assert_eq!(*volume, volume.round_dp(8));
    }

    let sol = report.outcomes.iter().find(|o| o.pair == "SOLEUR").unwrap();
    assert_eq!(sol.outcome.skip_reason(), Some(SkipReason::ConditionsNotMet));
    assert!(report.fiat_submitted > Decimal::ZERO);
}

#[tokio::test]
async fn test_dev_cycle_places_no_orders() {
    let exchange = Arc::new(exchange());
    let report = orchestrator(exchange.clone(), dev())
        .run_cycle(&pairs(), CycleTrigger::on_time())
        .await;

    assert!(exchange.orders().is_empty());
    assert_eq!(report.executed, 0);
    assert_eq!(report.fiat_submitted, Decimal::ZERO);

    let guarded = report
        .outcomes
        .iter()
        .filter(|o| o.outcome.skip_reason() == Some(SkipReason::NonProductionGuard))
        .count();
    assert_eq!(guarded, 2);
}

#[tokio::test]
async fn test_feed_outage_skips_only_that_pair() {
    let exchange = Arc::new(exchange());
    exchange.set_feed_down("XXBTZEUR");

    let report = orchestrator(exchange.clone(), prod())
        .run_cycle(&pairs(), CycleTrigger::on_time())
        .await;

    let btc = report.outcomes.iter().find(|o| o.pair == "XXBTZEUR").unwrap();
    assert_eq!(btc.outcome.skip_reason(), Some(SkipReason::FeedUnavailable));
    assert!(btc.decision.is_none());

    let eth = report.outcomes.iter().find(|o| o.pair == "XETHZEUR").unwrap();
    assert!(eth.outcome.is_executed());
    assert_eq!(exchange.orders().len(), 1);
}

#[tokio::test]
async fn test_unknown_pair_is_feed_unavailable() {
    let exchange = Arc::new(exchange());
    let report = orchestrator(exchange, prod())
        .run_cycle(
            &[AssetPairConfig::new("NOPEEUR", dec!(4))],
            CycleTrigger::on_time(),
        )
        .await;
    assert_eq!(
        report.outcomes[0].outcome.skip_reason(),
        Some(SkipReason::FeedUnavailable)
    );
}

#[tokio::test]
async fn test_rejection_reported_then_next_tick_retries() {
    let exchange = Arc::new(exchange());
    exchange.set_order_error(ExecutionError::OrderRejected {
        reason: "EOrder:Insufficient funds".into(),
    });
    let orch = orchestrator(exchange.clone(), prod());

    let first = orch.run_cycle(&pairs(), CycleTrigger::on_time()).await;
    assert_eq!(first.failed, 2);
    for record in first.outcomes.iter().filter(|o| o.pair != "SOLEUR") {
        match &record.outcome {
            Outcome::Failed { reason } => assert!(reason.contains("Insufficient funds")),
            other => panic!("expected Failed, got {other}"),
        }
    }
    assert!(exchange.orders().is_empty());

    exchange.clear_errors();
    let second = orch.run_cycle(&pairs(), CycleTrigger::past_due()).await;
    assert_eq!(second.executed, 2);
    assert_eq!(exchange.orders().len(), 2);
}

#[tokio::test]
async fn test_exchange_minimum_raises_volume() {
    let exchange = Arc::new(exchange());
    exchange.set_ordermin("XXBTZEUR", dec!(0.002));

    orchestrator(exchange.clone(), prod())
        .run_cycle(
            &[AssetPairConfig::new("XXBTZEUR", dec!(4))],
            CycleTrigger::on_time(),
        )
        .await;

    assert_eq!(exchange.orders(), vec![("XXBTZEUR".to_string(), dec!(0.002))]);
}

#[tokio::test]
async fn test_zero_budget_pair_places_no_order() {
    let exchange = Arc::new(exchange());
    let pairs = [
        AssetPairConfig::new("XXBTZEUR", Decimal::ZERO),
        AssetPairConfig::new("XETHZEUR", dec!(4)),
    ];

    let report = orchestrator(exchange.clone(), prod())
        .run_cycle(&pairs, CycleTrigger::on_time())
        .await;

    let btc = report.outcomes.iter().find(|o| o.pair == "XXBTZEUR").unwrap();
    assert_eq!(btc.outcome.skip_reason(), Some(SkipReason::InvalidBudget));
    assert_eq!(report.executed, 1);
    assert_eq!(exchange.orders().len(), 1);
    assert_eq!(exchange.orders()[0].0, "XETHZEUR");
}

#[tokio::test]
async fn test_environment_flip_takes_effect_next_cycle() {
    let var = "CB0T_INTEGRATION_ENV_FLIP";
    std::env::remove_var(var);

    let exchange = Arc::new(exchange());
    let orch = orchestrator(exchange.clone(), Arc::new(EnvVarSignal::new(var)));
    let pairs = [AssetPairConfig::new("XETHZEUR", dec!(4))];

    let dev_report = orch.run_cycle(&pairs, CycleTrigger::on_time()).await;
    assert_eq!(dev_report.environment, Environment::Dev);
    assert!(exchange.orders().is_empty());

    std::env::set_var(var, "PROD");
    let prod_report = orch.run_cycle(&pairs, CycleTrigger::on_time()).await;
    assert_eq!(prod_report.environment, Environment::Prod);
    assert_eq!(exchange.orders().len(), 1);
}

#[tokio::test]
async fn test_shipped_config_drives_a_cycle() {
    let cfg = AppConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
    let exchange = Arc::new(exchange());

    let orch = AccumulationOrchestrator::new(
        exchange.clone(),
        exchange.clone(),
        dev(),
        &cfg.engine,
        Duration::from_secs(cfg.schedule.cycle_deadline_secs),
    );
    let report = orch.run_cycle(&cfg.pairs, CycleTrigger::on_time()).await;

    assert_eq!(report.total(), cfg.pairs.len());
    assert!(exchange.orders().is_empty());
}
