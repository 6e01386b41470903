use crate::config::AppConfig;
use crate::data::{DataClient, RollingWindow};
use crate::dispatch::{Notifier, SignalPayload, SignalSink};
use crate::models::{TradeDecision, TradeType};
use crate::strategy::{MarketData, SeriesSpec, Strategy};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Loop timing and initialization policy
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub poll_interval: Duration,
    pub init_max_retries: u32,
    pub init_retry_delay: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            init_max_retries: 5,
            init_retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for RunnerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            init_max_retries: config.init_max_retries.max(1),
            init_retry_delay: Duration::from_secs(config.init_retry_delay_secs),
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Trading data is stale, decision skipped
    Stale,
    /// No new trading bar since the last decision
    Waiting,
    NoSignal,
    Emitted(TradeType),
    /// Same instruction already sent for this bar
    Duplicate(TradeType),
}

/// Drives one strategy: owns its windows, state flags and collaborators
pub struct StrategyRunner {
    strategy: Arc<dyn Strategy>,
    data: DataClient,
    sink: Arc<dyn SignalSink>,
    notifier: Arc<dyn Notifier>,
    channel: Option<String>,
    settings: RunnerSettings,
    trading: RollingWindow,
    daily: Option<RollingWindow>,
    stale_data: bool,
    first_update: bool,
    last_emitted: Option<(TradeType, DateTime<Utc>)>,
}

impl StrategyRunner {
    pub fn new(
        strategy: Arc<dyn Strategy>,
        data: DataClient,
        sink: Arc<dyn SignalSink>,
        notifier: Arc<dyn Notifier>,
        channel: Option<String>,
        settings: RunnerSettings,
    ) -> Self {
        let trading = RollingWindow::new(strategy.trading_series().count);
        let daily = strategy.daily_series().map(|s| RollingWindow::new(s.count));

        Self {
            strategy,
            data,
            sink,
            notifier,
            channel,
            settings,
            trading,
            daily,
            stale_data: false,
            first_update: true,
            last_emitted: None,
        }
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn symbol(&self) -> &str {
        self.strategy.symbol()
    }

    pub fn is_stale(&self) -> bool {
        self.stale_data
    }

    pub fn trading_window(&self) -> &RollingWindow {
        &self.trading
    }

    async fn notify(&self, message: &str) {
        self.notifier
            .notify(self.strategy.name(), self.channel.as_deref(), message)
            .await;
    }

    async fn load(&mut self, spec: SeriesSpec) -> Result<RollingWindow> {
        let symbol = self.strategy.symbol().to_string();
        let bars = self
            .data
            .get_historical_data(&symbol, spec.minutes, spec.count)
            .await?;
        Ok(RollingWindow::from_bars(bars, spec.count))
    }

    async fn try_initialize(&mut self) -> Result<()> {
        let trading = self.load(self.strategy.trading_series()).await?;
        let daily = match self.strategy.daily_series() {
            Some(spec) => Some(self.load(spec).await?),
            None => None,
        };

        self.trading = trading;
        self.daily = daily;
        Ok(())
    }

    /// Load the historical windows, retrying a bounded number of times
    ///
    /// On exhaustion the operator is notified and the error is returned; the
    /// caller treats it as fatal.
    pub async fn initialize(&mut self) -> Result<()> {
        let max = self.settings.init_max_retries;
        let mut last_error = None;

        for attempt in 1..=max {
            match self.try_initialize().await {
                Ok(()) => {
                    tracing::info!(
                        "✓ {} initialized with {} trading bars",
                        self.strategy.name(),
                        self.trading.len()
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Historical data fetching failed (attempt {}/{}): {:#}",
                        attempt,
                        max,
                        e
                    );
                    last_error = Some(e);
                    if attempt < max {
                        tokio::time::sleep(self.settings.init_retry_delay).await;
                    }
                }
            }
        }

        let msg = format!(
            "Historical data fetching failed for {} after {} retries",
            self.strategy.name(),
            max
        );
        tracing::error!("✗ {}", msg);
        self.notify(&msg).await;

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("no attempts made"))
            .context(msg))
    }

    /// Refresh the windows; true when a decision should run
    async fn update_data(&mut self) -> bool {
        let symbol = self.strategy.symbol().to_string();
        let spec = self.strategy.trading_series();

        let outcome = self
            .data
            .update_candles(&symbol, &mut self.trading, spec.minutes)
            .await;

        if let (Some(window), Some(daily)) = (self.daily.as_mut(), self.strategy.daily_series()) {
            self.data
                .update_candles(&symbol, window, daily.minutes)
                .await;
        }

        self.stale_data = outcome.stale;
        if outcome.stale {
            let last_update = self
                .data
                .last_update_time()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            let msg = format!(
                "Stale data in update | {}m bar | last update {}",
                spec.minutes, last_update
            );
            tracing::error!("✗ {}", msg);
            self.notify(&msg).await;
            return false;
        }

        let mut go = outcome.updated;
        if self.first_update {
            go = true;
            self.first_update = false;
        }
        go
    }

    async fn evaluate(&self) -> Result<TradeDecision> {
        let strategy = Arc::clone(&self.strategy);
        let data = MarketData {
            trading: self.trading.to_vec(),
            daily: self.daily.as_ref().map(|w| w.to_vec()),
        };

        tokio::task::spawn_blocking(move || strategy.evaluate(&data))
            .await
            .context("Signal computation panicked")?
    }

    /// One update, decide, dispatch pass
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if !self.update_data().await {
            if self.stale_data {
                return Ok(CycleOutcome::Stale);
            }
            tracing::debug!("Data not updated, waiting....");
            return Ok(CycleOutcome::Waiting);
        }

        tracing::info!("Running signal generation for {}", self.strategy.name());
        let decision = self.evaluate().await?;

        let (Some(trade_type), Some(bar_time)) = (decision.trade_type, decision.bar_time) else {
            return Ok(CycleOutcome::NoSignal);
        };

        if self.last_emitted == Some((trade_type, bar_time)) {
            tracing::debug!("{} already sent for bar {}", trade_type, bar_time);
            return Ok(CycleOutcome::Duplicate(trade_type));
        }

        tracing::info!("📈 {} signal generated: {}", self.strategy.name(), trade_type);

        let payload = SignalPayload::from_decision(self.strategy.name(), &decision)
            .context("Decision without a trade type")?;
        self.last_emitted = Some((trade_type, bar_time));
        self.sink.send_signal(&payload).await?;

        Ok(CycleOutcome::Emitted(trade_type))
    }

    /// Cycle until `shutdown` flips to true
    ///
    /// A failing cycle is logged and reported, and the loop carries on.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("🔄 {} loop started on {}", self.strategy.name(), self.strategy.symbol());

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                tracing::error!("✗ Error in signal generation: {:#}", e);
                self.notify(&format!("Error in main loop: {}", e)).await;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("👋 {} stopped", self.strategy.name());
    }
}
