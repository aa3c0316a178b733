//! Core engine: one fetch → evaluate → size → gate → execute pass per tick.

pub mod orchestrator;
pub mod report;

pub use orchestrator::AccumulationOrchestrator;
pub use report::{CycleReport, CycleTrigger};
