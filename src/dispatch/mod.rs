// Outbound signals to execution systems and chat notifications
pub mod recording;
pub mod signal;
pub mod slack;

pub use recording::{RecordingNotifier, RecordingSink};
pub use signal::{HttpSignalDispatcher, SignalPayload, DEFAULT_SLIPPAGE};
pub use slack::SlackNotifier;

use anyhow::Result;
use async_trait::async_trait;

/// Destination for trade signals
#[async_trait]
pub trait SignalSink: Send + Sync {
    /// Deliver one signal to every configured system
    ///
    /// Every system is attempted; the error lists the ones that failed.
    async fn send_signal(&self, payload: &SignalPayload) -> Result<()>;
}

/// Free-text operator notifications
///
/// Delivery problems are logged by the implementation and never returned:
/// a missing notification must not stop signal generation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, strategy: &str, channel: Option<&str>, message: &str);
}
