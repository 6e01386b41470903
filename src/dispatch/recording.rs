use super::{Notifier, SignalPayload, SignalSink};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Sink that keeps every payload in memory (dry runs and tests)
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SignalPayload>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SignalPayload> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SignalSink for RecordingSink {
    async fn send_signal(&self, payload: &SignalPayload) -> Result<()> {
        tracing::debug!("Recorded {} for {}", payload.trade_type, payload.strategy);
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("Recording sink poisoned: {}", e))?
            .push(payload.clone());
        Ok(())
    }
}

/// Notifier that keeps `"<strategy>: <message>"` lines in memory
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, strategy: &str, _channel: Option<&str>, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(format!("{}: {}", strategy, message));
        }
    }
}
