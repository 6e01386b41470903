// Market regime classification and regime gating of strategy triggers
pub mod classifier;
pub mod filter;

pub use classifier::{infer_frequency, regime_at, regime_class, upsample, RegimeClassifier};
pub use filter::apply_regime_filter;
