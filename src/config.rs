//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (Kraken API keys) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

use crate::strategy::StrategyConfig;
use crate::types::AssetPairConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub engine: StrategyConfig,
    #[serde(default)]
    pub pairs: Vec<AssetPairConfig>,
    #[serde(default)]
    pub kraken: KrakenConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Env var holding the deployment environment (`PROD` or `DEV`).
    #[serde(default = "default_environment_var")]
    pub environment_var: String,
}

fn default_environment_var() -> String {
    "CB0TENV".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    pub dev_interval_secs: u64,
    pub prod_interval_secs: u64,
    /// A tick firing later than this after its slot is reported past due.
    pub past_due_tolerance_secs: u64,
    /// Budget for one whole cycle across all pairs.
    pub cycle_deadline_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            dev_interval_secs: 10,
            prod_interval_secs: 2 * 24 * 60 * 60,
            past_due_tolerance_secs: 5,
            cycle_deadline_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KrakenConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    /// Candle size used for price history (1440 = daily).
    pub ohlc_interval_minutes: u32,
    pub timeout_secs: u64,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kraken.com".to_string(),
            api_key_env: "KRAKENAPIKEY".to_string(),
            api_secret_env: "KRAKENAPISECRET".to_string(),
            ohlc_interval_minutes: 1440,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 7071,
        }
    }
}

/// Config values that parse but make no sense.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("No pairs configured")]
    NoPairs,

    #[error("Pair {pair}: fiat budget must be positive, got {budget}")]
    NonPositiveBudget { pair: String, budget: Decimal },

    #[error("Pair {pair}: min volume must not be negative, got {min_volume}")]
    NegativeMinVolume { pair: String, min_volume: Decimal },

    #[error("Invalid engine setting {field}: {message}")]
    Engine { field: &'static str, message: String },

    #[error("Invalid schedule setting {field}: must be positive")]
    Schedule { field: &'static str },
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Used for the secrets the config refers to by name.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.pairs.is_empty() {
            return Err(ConfigError::NoPairs);
        }
        for pair in &self.pairs {
            if pair.fiat_budget <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveBudget {
                    pair: pair.pair.clone(),
                    budget: pair.fiat_budget,
                });
            }
            if pair.min_volume < Decimal::ZERO {
                return Err(ConfigError::NegativeMinVolume {
                    pair: pair.pair.clone(),
                    min_volume: pair.min_volume,
                });
            }
        }

        let engine = &self.engine;
        let check = |ok: bool, field: &'static str, message: &str| {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Engine {
                    field,
                    message: message.to_string(),
                })
            }
        };

        check(engine.trend.lookback >= 2, "trend.lookback", "must be at least 2")?;
        check(
            engine.trend.short_window >= 1 && engine.trend.short_window < engine.trend.lookback,
            "trend.short_window",
            "must be between 1 and lookback - 1",
        )?;
        check(engine.trend.threshold >= Decimal::ZERO, "trend.threshold", "must not be negative")?;
        check(engine.trend.saturation > Decimal::ZERO, "trend.saturation", "must be positive")?;

        check(engine.bottom.lookback >= 3, "bottom.lookback", "must be at least 3")?;
        check(engine.bottom.tolerance >= Decimal::ZERO, "bottom.tolerance", "must not be negative")?;
        check(engine.bottom.min_decline >= Decimal::ZERO, "bottom.min_decline", "must not be negative")?;
        check(engine.bottom.saturation > Decimal::ZERO, "bottom.saturation", "must be positive")?;

        let acc = &engine.accelerator;
        check(acc.weight_trend >= Decimal::ZERO, "accelerator.weight_trend", "must not be negative")?;
        check(acc.weight_bottom >= Decimal::ZERO, "accelerator.weight_bottom", "must not be negative")?;
        check(
            acc.floor > Decimal::ZERO && acc.floor <= Decimal::ONE,
            "accelerator.floor",
            "must be in (0, 1]",
        )?;
        check(acc.ceiling >= Decimal::ONE, "accelerator.ceiling", "must be at least 1")?;

        check(engine.volume.precision <= 18, "volume.precision", "must be at most 18")?;

        let sched = &self.schedule;
        for (value, field) in [
            (sched.dev_interval_secs, "dev_interval_secs"),
            (sched.prod_interval_secs, "prod_interval_secs"),
            (sched.cycle_deadline_secs, "cycle_deadline_secs"),
        ] {
            if value == 0 {
                return Err(ConfigError::Schedule { field });
            }
        }

        Ok(())
    }
}
