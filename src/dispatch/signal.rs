use super::SignalSink;
use crate::config::SystemConfig;
use crate::models::{TradeDecision, TradeType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLIPPAGE: f64 = 0.1;

/// JSON body posted to an execution system
///
/// Unset optional fields are omitted rather than sent as null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalPayload {
    pub strategy: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perc_equity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl_stop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_stop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_regime_class: Option<u8>,
    pub slippage: f64,
    /// Fresh token per signal
    pub interval: String,
    pub ignore_two_min_interval: bool,
}

impl SignalPayload {
    /// Payload for a decision, `None` when the decision carries no signal
    pub fn from_decision(strategy: &str, decision: &TradeDecision) -> Option<Self> {
        let trade_type = decision.trade_type?;

        Some(Self {
            strategy: strategy.to_string(),
            trade_type,
            perc_equity: decision.perc_equity,
            sl_stop: decision.sl_stop,
            tp_stop: decision.tp_stop,
            current_regime_class: decision.current_regime_class,
            slippage: DEFAULT_SLIPPAGE,
            interval: uuid::Uuid::new_v4().to_string(),
            ignore_two_min_interval: true,
        })
    }
}

/// Posts signals to every system with a trading URL
pub struct HttpSignalDispatcher {
    client: Client,
    systems: Vec<SystemConfig>,
    dev_mode: bool,
}

impl HttpSignalDispatcher {
    pub fn new(systems: Vec<SystemConfig>, dev_mode: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let systems = systems
            .into_iter()
            .filter(|s| s.trading_url.is_some())
            .collect();

        Ok(Self {
            client,
            systems,
            dev_mode,
        })
    }

    async fn post(&self, url: &str, payload: &SignalPayload) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("HTTP {}: {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl SignalSink for HttpSignalDispatcher {
    async fn send_signal(&self, payload: &SignalPayload) -> Result<()> {
        if self.dev_mode {
            tracing::info!(
                "🧪 Dev mode, not sending {} for {} (perc_equity: {:?}, sl: {:?}, tp: {:?}, regime: {:?})",
                payload.trade_type,
                payload.strategy,
                payload.perc_equity,
                payload.sl_stop,
                payload.tp_stop,
                payload.current_regime_class
            );
            return Ok(());
        }

        let mut failed = Vec::new();

        for system in &self.systems {
            let Some(url) = system.trading_url.as_deref() else {
                continue;
            };

            match self.post(url, payload).await {
                Ok(()) => tracing::info!(
                    "✓ Sent {} for {} to {}",
                    payload.trade_type,
                    payload.strategy,
                    system.name
                ),
                Err(e) => {
                    tracing::error!(
                        "✗ Failed to send {} for {} to {}: {:#}",
                        payload.trade_type,
                        payload.strategy,
                        system.name,
                        e
                    );
                    failed.push(system.name.clone());
                }
            }
        }

        if !failed.is_empty() {
            anyhow::bail!("Signal delivery failed for: {}", failed.join(", "));
        }

        Ok(())
    }
}
