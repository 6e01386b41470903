// Application configuration: TOML file layered with SIGNALBOT__ environment overrides
pub mod params;

use crate::models::Direction;
use crate::regime::RegimeClassifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub use params::{
    BollingerParams, MaCrossoverParams, MacdParams, PsarParams, PsarSettings,
    RsiDivergenceParams, StrategyParams, TradeSizes,
};

/// Daily bars kept for regime classification (365-day volatility plus slack)
pub const DEFAULT_DAILY_BARS: usize = 400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Log signals instead of posting them
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: i64,
    #[serde(default = "default_init_max_retries")]
    pub init_max_retries: u32,
    #[serde(default = "default_init_retry_delay_secs")]
    pub init_retry_delay_secs: u64,
    #[serde(default)]
    pub slack: SlackConfig,
    pub systems: Vec<SystemConfig>,
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    pub token: Option<String>,
    pub channel: Option<String>,
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
    #[serde(default = "default_slack_messages_per_minute")]
    pub messages_per_minute: u32,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel: None,
            api_url: default_slack_api_url(),
            messages_per_minute: default_slack_messages_per_minute(),
        }
    }
}

/// A database and/or execution endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    pub name: String,
    pub db_url: Option<String>,
    /// Systems with a trading URL receive every emitted signal
    pub trading_url: Option<String>,
    #[serde(default = "default_bar_table")]
    pub bar_table: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,
    pub symbol: String,
    /// Name of the system that supplies bars
    pub data_system: String,
    /// Notification channel override (falls back to the Slack default)
    pub channel: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub directions: Vec<Direction>,
    #[serde(default)]
    pub use_regime: bool,
    #[serde(default = "default_regime_classes")]
    pub regime_classes: Vec<u8>,
    /// Carry entries blocked by the regime filter forward to the next allowed bar
    #[serde(default)]
    pub ffill_entries: bool,
    #[serde(default = "default_daily_bars")]
    pub daily_bars: usize,
    pub params: StrategyParams,
}

impl AppConfig {
    /// Load from a TOML file with `SIGNALBOT__` environment overrides
    ///
    /// A `.env` file in the working directory is read first so its variables
    /// take part in the override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(true))
            .add_source(
                ::config::Environment::with_prefix("SIGNALBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text directly (no file or environment layer)
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn system(&self, name: &str) -> Option<&SystemConfig> {
        self.systems.iter().find(|s| s.name == name)
    }

    /// Systems that receive outbound signals
    pub fn trading_systems(&self) -> Vec<SystemConfig> {
        self.systems
            .iter()
            .filter(|s| s.trading_url.is_some())
            .cloned()
            .collect()
    }

    /// Fail fast on anything that would only surface mid-run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.poll_interval_secs == 0 {
            return invalid("poll_interval_secs must be positive".to_string());
        }
        if self.stale_threshold_secs < 0 {
            return invalid("stale_threshold_secs must not be negative".to_string());
        }

        let mut system_names = HashSet::new();
        for system in &self.systems {
            if !system_names.insert(system.name.as_str()) {
                return invalid(format!("duplicate system name '{}'", system.name));
            }
        }

        let regime_warmup = RegimeClassifier::default().warmup_bars();
        let mut strategy_names = HashSet::new();
        for strategy in &self.strategies {
            let name = &strategy.name;

            if !strategy_names.insert(name.as_str()) {
                return invalid(format!("duplicate strategy name '{}'", name));
            }

            match self.system(&strategy.data_system) {
                None => {
                    return invalid(format!(
                        "strategy '{}' references unknown data system '{}'",
                        name, strategy.data_system
                    ))
                }
                Some(system) if system.db_url.is_none() => {
                    return invalid(format!(
                        "data system '{}' used by '{}' has no db_url",
                        system.name, name
                    ))
                }
                Some(_) => {}
            }

            if strategy.directions.is_empty() {
                return invalid(format!("strategy '{}' has no directions", name));
            }

            if let Some(class) = strategy.regime_classes.iter().find(|c| !(1..=6).contains(*c)) {
                return invalid(format!(
                    "strategy '{}' has regime class {} outside 1..=6",
                    name, class
                ));
            }

            if strategy.use_regime && strategy.daily_bars < regime_warmup {
                return invalid(format!(
                    "strategy '{}' needs at least {} daily bars for regime filtering, got {}",
                    name, regime_warmup, strategy.daily_bars
                ));
            }

            strategy
                .params
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("strategy '{}': {}", name, e)))?;
        }

        Ok(())
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}
fn default_stale_threshold_secs() -> i64 {
    120
}
fn default_init_max_retries() -> u32 {
    5
}
fn default_init_retry_delay_secs() -> u64 {
    5
}
fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}
fn default_slack_messages_per_minute() -> u32 {
    20
}
fn default_bar_table() -> String {
    "candle".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_true() -> bool {
    true
}
fn default_regime_classes() -> Vec<u8> {
    (1..=6).collect()
}
fn default_daily_bars() -> usize {
    DEFAULT_DAILY_BARS
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_CONFIG: &str = r#"
dev_mode = true

[slack]
channel = "signals"

[[systems]]
name = "research"
db_url = "postgres://localhost/research"

[[systems]]
name = "exec"
trading_url = "http://localhost:8000/signal"

[[strategies]]
name = "MA Cross BTC"
symbol = "BTCUSDT"
data_system = "research"
directions = ["long", "short"]
use_regime = true
regime_classes = [1, 2, 3]

[strategies.params]
type = "ma_crossover"
fast_period = 10
slow_period = 55

[[strategies]]
name = "Parabolic SAR"
symbol = "BTCUSDT"
data_system = "research"
directions = ["long", "short"]

[strategies.params]
type = "psar"
mt_len = 43200
rolling_ret_period = 30
rolling_peak_valley_period = 1440
rolling_ret_thresh = 0.01
peak_valley_chg_thresh = 0.05
vol_thresh = 0.6
trade_sizes_long = { high_vol = 0.5, low_vol = 1.0 }
trade_sizes_short = { high_vol = 0.25, low_vol = 0.5 }

[strategies.params.psar_settings.default]
window = 2

[strategies.params.psar_settings.ETHUSDT]
window = 4
start = 0.01
"#;

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml_str(BASE_CONFIG).unwrap();

        assert!(config.dev_mode);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.stale_threshold_secs, 120);
        assert_eq!(config.init_max_retries, 5);
        assert_eq!(config.slack.channel.as_deref(), Some("signals"));
        assert_eq!(config.systems[0].bar_table, "candle");
        assert_eq!(config.trading_systems().len(), 1);

        let ma = &config.strategies[0];
        assert!(ma.enabled);
        assert_eq!(ma.directions, vec![Direction::Long, Direction::Short]);
        assert_eq!(ma.regime_classes, vec![1, 2, 3]);
        assert_eq!(ma.daily_bars, DEFAULT_DAILY_BARS);
        assert_eq!(ma.params.number_of_candles(), 57);

        match &config.strategies[1].params {
            StrategyParams::Psar(p) => {
                assert_eq!(p.number_of_candles, 43_202);
                assert_eq!(p.settings_for("ETHUSDT").map(|s| s.window), Some(4));
                assert_eq!(p.settings_for("BTCUSDT").map(|s| s.window), Some(2));
                assert_eq!(p.trade_sizes_short.low_vol, 0.5);
            }
            other => panic!("unexpected params {:?}", other),
        }
    }

    #[test]
    fn test_unknown_data_system_rejected() {
        let toml = BASE_CONFIG.replacen("data_system = \"research\"", "data_system = \"nope\"", 1);
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("unknown data system"));
    }

    #[test]
    fn test_data_system_without_db_rejected() {
        let toml = BASE_CONFIG.replacen("data_system = \"research\"", "data_system = \"exec\"", 1);
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("has no db_url"));
    }

    #[test]
    fn test_regime_class_out_of_range_rejected() {
        let toml = BASE_CONFIG.replace("regime_classes = [1, 2, 3]", "regime_classes = [1, 7]");
        assert!(matches!(
            AppConfig::from_toml_str(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_directions_rejected() {
        let toml = BASE_CONFIG.replacen("directions = [\"long\", \"short\"]", "directions = []", 1);
        assert!(AppConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_duplicate_strategy_names_rejected() {
        let toml = BASE_CONFIG.replace("name = \"Parabolic SAR\"", "name = \"MA Cross BTC\"");
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("duplicate strategy"));
    }

    #[test]
    fn test_short_daily_window_rejected_with_regime() {
        let toml = BASE_CONFIG.replace(
            "regime_classes = [1, 2, 3]",
            "regime_classes = [1, 2, 3]\ndaily_bars = 365",
        );
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("at least 366 daily bars"));

        let toml = BASE_CONFIG.replace(
            "regime_classes = [1, 2, 3]",
            "regime_classes = [1, 2, 3]\ndaily_bars = 366",
        );
        assert!(AppConfig::from_toml_str(&toml).is_ok());
    }

    #[test]
    fn test_misspelled_strategy_key_rejected() {
        let toml = BASE_CONFIG
            .replace("use_regime = true", "use_regim = true")
            .replace("regime_classes = [1, 2, 3]", "regime_clases = [1]");
        let err = AppConfig::from_toml_str(&toml).unwrap_err();

        let message = err.to_string();

        assert!(matches!(err, ConfigError::Load(_)));
        assert!(message.contains("use_regim") || message.contains("regime_clases"));
    }

    #[test]
    fn test_unknown_keys_rejected_at_every_level() {
        for (from, to) in [
            ("dev_mode = true", "dev_mode = true
poll_secs = 5"),
            ("channel = \"signals\"", "channel = \"signals\"
chanel = \"x\""),
            (
                "db_url = \"postgres://localhost/research\"",
                "db_url = \"postgres://localhost/research\"
bar_tabel = \"candles\"",
            ),
        ] {
            let toml = BASE_CONFIG.replacen(from, to, 1);
            assert!(AppConfig::from_toml_str(&toml).is_err(), "accepted {}", to);
        }
    }

    #[test]
    fn test_missing_params_type_rejected() {
        let toml = BASE_CONFIG.replace("type = \"ma_crossover\"\n", "");
        assert!(matches!(
            AppConfig::from_toml_str(&toml),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_load_reads_toml_file() {
        let path = std::env::temp_dir().join(format!("signalbot-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, BASE_CONFIG).unwrap();

        let loaded = AppConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.strategies.len(), 2);
        assert_eq!(config.systems[0].name, "research");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/signalbot.toml");
        let text = std::fs::read_to_string(path).unwrap();
        let config = AppConfig::from_toml_str(&text).unwrap();

        assert_eq!(config.trading_systems().len(), 2);
        assert_eq!(config.strategies.len(), 5);
        assert!(!config.strategies[4].enabled);
    }
}
