// Per-strategy scheduling: data refresh, decision, dispatch
pub mod runner;

pub use runner::{CycleOutcome, RunnerSettings, StrategyRunner};
