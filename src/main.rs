use anyhow::{Context, Result};
use clap::Parser;
use signalbot::config::AppConfig;
use signalbot::data::{DataClient, DatabaseClient, PostgresBarRepository};
use signalbot::dispatch::{HttpSignalDispatcher, Notifier, SignalSink, SlackNotifier};
use signalbot::execution::{RunnerSettings, StrategyRunner};
use signalbot::strategy::build_strategy;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "signalbot")]
#[command(about = "Generate trade signals from market bars and post them to execution systems")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/signalbot.toml")]
    config: PathBuf,

    /// Only run these strategies (repeatable, default: every enabled strategy)
    #[arg(short, long)]
    strategy: Vec<String>,

    /// Compute and log signals without sending them
    #[arg(long)]
    dev_mode: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let args = Args::parse();

    tracing::info!("🚀 Signalbot starting");

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    config.dev_mode |= args.dev_mode;

    if config.dev_mode {
        tracing::info!("🧪 Dev mode: signals are logged, not sent");
    }

    let database = Arc::new(DatabaseClient::new(&config.systems));
    let sink: Arc<dyn SignalSink> = Arc::new(HttpSignalDispatcher::new(
        config.trading_systems(),
        config.dev_mode,
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(SlackNotifier::new(&config.slack)?);
    let settings = RunnerSettings::from(&config);

    let selected: Vec<_> = config
        .strategies
        .iter()
        .filter(|s| s.enabled)
        .filter(|s| args.strategy.is_empty() || args.strategy.contains(&s.name))
        .collect();

    if selected.is_empty() {
        anyhow::bail!("No enabled strategies to run");
    }

    let mut runners = Vec::with_capacity(selected.len());
    for strategy_config in selected {
        let system = config
            .system(&strategy_config.data_system)
            .with_context(|| format!("Unknown data system {}", strategy_config.data_system))?;

        let repository = Arc::new(PostgresBarRepository::new(
            database.clone(),
            &system.name,
            &system.bar_table,
        )?);
        let data = DataClient::new(repository, config.stale_threshold_secs);

        let mut runner = StrategyRunner::new(
            build_strategy(strategy_config),
            data,
            sink.clone(),
            notifier.clone(),
            strategy_config.channel.clone(),
            settings.clone(),
        );

        runner
            .initialize()
            .await
            .with_context(|| format!("Failed to initialize {}", strategy_config.name))?;

        tracing::info!(
            "✅ {} ready ({} on {})",
            strategy_config.name,
            strategy_config.symbol,
            system.name
        );
        runners.push(runner);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles: Vec<_> = runners
        .into_iter()
        .map(|runner| {
            let span = tracing::info_span!(
                "strategy",
                name = %runner.name(),
                symbol = %runner.symbol()
            );
            tokio::spawn(runner.run(shutdown_rx.clone()).instrument(span))
        })
        .collect();

    tracing::info!("🔄 {} strategy loop(s) running", handles.len());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("👋 Shutting down gracefully...");
        }
    }

    shutdown_tx.send(true).ok();

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("✗ Strategy task failed: {}", e);
        }
    }

    tracing::info!("👋 Signalbot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("signalbot=info,signalbot::strategy=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
