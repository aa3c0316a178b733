//! cb0t: recurring crypto accumulation bot
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the Kraken adapter into the orchestrator, and runs one cycle per
//! scheduler tick until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use cb0t::config::{self, AppConfig};
use cb0t::dashboard::{self, DashboardState};
use cb0t::engine::{AccumulationOrchestrator, CycleTrigger};
use cb0t::environment::{EnvVarSignal, EnvironmentSignal};
use cb0t::market::kraken::{KrakenClient, KrakenCredentials};

const BANNER: &str = r#"
        _      ___  _
   ___ | |__  / _ \| |_
  / __|| '_ \| | | | __|
 | (__ | |_) | |_| | |_
  \___||_.__/ \___/ \__|

  Recurring accumulation on Kraken
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("CB0T_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging(&cfg);

    println!("{BANNER}");

    let environment = Arc::new(EnvVarSignal::new(cfg.agent.environment_var.clone()));
    let startup_env = environment.current();
    let cadence = if startup_env.is_production() {
        Duration::from_secs(cfg.schedule.prod_interval_secs)
    } else {
        Duration::from_secs(cfg.schedule.dev_interval_secs)
    };

    info!(
        agent_name = %cfg.agent.name,
        environment = %startup_env,
        interval_secs = cadence.as_secs(),
        pairs = cfg.pairs.len(),
        config = %config_path,
        "cb0t starting up"
    );

    // -- Initialise components -------------------------------------------

    let credentials = KrakenCredentials::from_env(&cfg.kraken);
    if credentials.is_none() {
        warn!(
            key_env = %cfg.kraken.api_key_env,
            secret_env = %cfg.kraken.api_secret_env,
            "Kraken credentials not set; order submission and balances unavailable"
        );
    }
    let kraken = Arc::new(
        KrakenClient::new(&cfg.kraken, credentials).context("Failed to build Kraken client")?,
    );

    let orchestrator = AccumulationOrchestrator::new(
        kraken.clone(),
        kraken.clone(),
        environment.clone(),
        &cfg.engine,
        Duration::from_secs(cfg.schedule.cycle_deadline_secs),
    );
    info!(
        deadline_secs = orchestrator.deadline().as_secs(),
        window = cfg.engine.history_window(),
        "Orchestrator ready"
    );

    let dashboard_state = if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            kraken.clone(),
            kraken.clone(),
            environment.clone(),
        ));
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port).await?;
        Some(state)
    } else {
        None
    };

    // -- Main loop -------------------------------------------------------

    let tolerance = Duration::from_secs(cfg.schedule.past_due_tolerance_secs);
    let mut ticker = interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Entering main loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            scheduled = ticker.tick() => {
                let trigger = trigger_for(scheduled, Instant::now(), tolerance);
                if trigger.past_due {
                    warn!(
                        late_ms = Instant::now().saturating_duration_since(scheduled).as_millis() as u64,
                        "Timer is running late"
                    );
                }

                let report = orchestrator.run_cycle(&cfg.pairs, trigger).await;

                if let Some(state) = &dashboard_state {
                    state.record_cycle(report).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("cb0t shut down cleanly.");
    Ok(())
}

/// A tick is past due when it fires more than `tolerance` after its slot.
fn trigger_for(scheduled: Instant, fired: Instant, tolerance: Duration) -> CycleTrigger {
    if fired.saturating_duration_since(scheduled) > tolerance {
        CycleTrigger::past_due()
    } else {
        CycleTrigger::on_time()
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cb0t=info"));

    let json_logging = std::env::var("CB0T_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }

    info!(agent = %cfg.agent.name, json = json_logging, "Logging initialised");
}
