//! Cycle report, one record per scheduler tick.
//!
//! Counts every pair outcome by kind and totals what was actually sent to
//! the exchange.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{Environment, Outcome, PairOutcome};

/// How the scheduler fired this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleTrigger {
    /// The tick fired later than its slot plus tolerance.
    pub past_due: bool,
}

impl CycleTrigger {
    pub fn on_time() -> Self {
        Self { past_due: false }
    }

    pub fn past_due() -> Self {
        Self { past_due: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub trigger: CycleTrigger,
    pub environment: Environment,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<PairOutcome>,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Notional of executed orders at the evaluated unit price.
    pub fiat_submitted: Decimal,
}

impl CycleReport {
    pub fn new(
        cycle_id: Uuid,
        trigger: CycleTrigger,
        environment: Environment,
        started_at: DateTime<Utc>,
        outcomes: Vec<PairOutcome>,
    ) -> Self {
        let mut executed = 0;
        let mut skipped = 0;
        let mut failed = 0;
        let mut fiat_submitted = Decimal::ZERO;

        for record in &outcomes {
            match &record.outcome {
                Outcome::Executed { .. } => {
                    executed += 1;
                    if let Some(decision) = &record.decision {
                        fiat_submitted += decision.volume * decision.unit_price;
                    }
                }
                Outcome::Skipped { .. } => skipped += 1,
                Outcome::Failed { .. } => failed += 1,
            }
        }

        Self {
            cycle_id,
            trigger,
            environment,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            executed,
            skipped,
            failed,
            fiat_submitted,
        }
    }

    pub fn total(&self) -> usize {
        self.executed + self.skipped + self.failed
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Log a human-readable cycle summary.
pub fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle_id = %report.cycle_id,
        environment = %report.environment,
        past_due = report.trigger.past_due,
        pairs = report.total(),
        executed = report.executed,
        skipped = report.skipped,
        failed = report.failed,
        fiat_submitted = %report.fiat_submitted.round_dp(2),
        duration_ms = report.duration_ms(),
        "Cycle complete"
    );

    if report.failed > 0 {
        warn!(
            cycle_id = %report.cycle_id,
            failed = report.failed,
            "Some pairs failed this cycle; next tick retries"
        );
    }
}
