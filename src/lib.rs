//! Trading-signal generation: market bars in, trade instructions out
pub mod config;
pub mod data;
pub mod dispatch;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod regime;
pub mod strategy;

// Re-export commonly used types
pub use models::*;
pub use strategy::Strategy;
