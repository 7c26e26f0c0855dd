//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::types::{Chain, Timeframe};

// Re-export section types owned by their modules
pub use crate::analytics::flow::FlowThresholds;
pub use crate::analytics::signal::{SignalPolicy, TakeProfitConfig, TakeProfitTarget};
pub use crate::backtest::types::StrategyDefinition;

/// Environment variable read when `provider.api_key` is unset
pub const API_KEY_ENV: &str = "NANSEN_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub take_profit: TakeProfitConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub signals: SignalPolicy,
    #[serde(default)]
    pub flow: FlowThresholds,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

/// Wallet-intelligence API connection
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key (falls back to NANSEN_API_KEY)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Minimum gap between requests
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Give up retrying after this long
    #[serde(default = "default_retry_max_elapsed_ms")]
    pub retry_max_elapsed_ms: u64,
    /// Page cap when walking trade history
    #[serde(default = "default_max_history_pages")]
    pub max_history_pages: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_elapsed_ms: default_retry_max_elapsed_ms(),
            max_history_pages: default_max_history_pages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON state file; empty keeps everything in memory
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_chains")]
    pub chains: Vec<Chain>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            chains: default_chains(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilteringConfig {
    #[serde(default = "default_max_token_age_live_days")]
    pub max_token_age_live_days: f64,
    #[serde(default = "default_max_token_age_backtest_days")]
    pub max_token_age_backtest_days: f64,
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            max_token_age_live_days: default_max_token_age_live_days(),
            max_token_age_backtest_days: default_max_token_age_backtest_days(),
            min_liquidity_usd: default_min_liquidity_usd(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How far back to pull smart money entries
    #[serde(default = "default_entry_lookback_days")]
    pub entry_lookback_days: i64,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default = "default_accumulation_window_minutes")]
    pub accumulation_window_minutes: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            entry_lookback_days: default_entry_lookback_days(),
            timeframe: Timeframe::default(),
            accumulation_window_minutes: default_accumulation_window_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_backtest_chain")]
    pub chain: Chain,
    /// Tokens discovered within this many days are replayed
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Entry history pulled per token
    #[serde(default = "default_backtest_lookback_days")]
    pub lookback_days: i64,
    /// Most recent tokens scanned from storage
    #[serde(default = "default_token_scan_limit")]
    pub token_scan_limit: usize,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyDefinition>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            seed: None,
            chain: default_backtest_chain(),
            window_days: default_window_days(),
            lookback_days: default_backtest_lookback_days(),
            token_scan_limit: default_token_scan_limit(),
            strategies: default_strategies(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.nansen.ai/api/v1".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_min_request_interval_ms() -> u64 {
    200
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_elapsed_ms() -> u64 {
    10_000
}

fn default_max_history_pages() -> u32 {
    20
}

fn default_storage_path() -> String {
    "./data/terminal.json".to_string()
}

fn default_chains() -> Vec<Chain> {
    vec![Chain::Solana, Chain::Base, Chain::Bnb]
}

fn default_max_token_age_live_days() -> f64 {
    1.0
}

fn default_max_token_age_backtest_days() -> f64 {
    7.0
}

fn default_min_liquidity_usd() -> f64 {
    100_000.0
}

fn default_interval_secs() -> u64 {
    300
}

fn default_entry_lookback_days() -> i64 {
    7
}

fn default_accumulation_window_minutes() -> i64 {
    60
}

fn default_backtest_chain() -> Chain {
    Chain::Solana
}

fn default_window_days() -> i64 {
    14
}

fn default_backtest_lookback_days() -> i64 {
    30
}

fn default_token_scan_limit() -> usize {
    1000
}

fn default_strategies() -> Vec<StrategyDefinition> {
    StrategyDefinition::defaults()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix TERMINAL_)
            .add_source(
                config::Environment::with_prefix("TERMINAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if config.provider.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                config.provider.api_key = key;
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.trading.chains.is_empty() {
            anyhow::bail!("trading.chains must list at least one chain");
        }

        for (name, target) in [
            ("tp1", self.take_profit.tp1),
            ("tp2", self.take_profit.tp2),
            ("tp3", self.take_profit.tp3),
        ] {
            if target.multiplier <= 0.0 {
                anyhow::bail!("take_profit.{}.multiplier must be positive", name);
            }
            if target.percent <= 0.0 || target.percent > 100.0 {
                anyhow::bail!("take_profit.{}.percent must be in (0, 100]", name);
            }
        }

        if self.signals.min_flow_score > 100 {
            anyhow::bail!("signals.min_flow_score cannot exceed 100");
        }

        if self.flow.positive_min_score > 100 || self.flow.strong_min_score > 100 {
            anyhow::bail!("flow score thresholds cannot exceed 100");
        }

        if self.filtering.min_liquidity_usd < 0.0 {
            anyhow::bail!("filtering.min_liquidity_usd cannot be negative");
        }

        if self.monitor.interval_secs == 0 {
            anyhow::bail!("monitor.interval_secs must be positive");
        }

        if self.monitor.accumulation_window_minutes <= 0 {
            anyhow::bail!("monitor.accumulation_window_minutes must be positive");
        }

        if self.provider.max_history_pages == 0 {
            anyhow::bail!("provider.max_history_pages must be positive");
        }

        if self.backtest.strategies.is_empty() {
            anyhow::bail!("backtest.strategies must list at least one strategy");
        }

        if !self.take_profit.is_ascending() {
            tracing::warn!(
                "Take-profit multipliers are not increasing (tp1={}, tp2={}, tp3={})",
                self.take_profit.tp1.multiplier,
                self.take_profit.tp2.multiplier,
                self.take_profit.tp3.multiplier
            );
        }

        Ok(())
    }

    /// Fail unless an API key is available
    pub fn require_provider_credentials(&self) -> Result<()> {
        if self.provider.api_key.is_empty() {
            anyhow::bail!(
                "Provider API key is required (set {} or provider.api_key)",
                API_KEY_ENV
            );
        }
        Ok(())
    }

    /// Signal gates with the liquidity floor from `filtering`
    pub fn signal_policy(&self) -> SignalPolicy {
        SignalPolicy {
            min_liquidity_usd: self.filtering.min_liquidity_usd,
            ..self.signals.clone()
        }
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let chains: Vec<&str> = self.trading.chains.iter().map(|c| c.as_str()).collect();
        let strategies: Vec<&str> = self
            .backtest
            .strategies
            .iter()
            .map(|s| s.name.as_str())
            .collect();

        format!(
            r#"Configuration:
  Provider:
    base_url: {}
    api_key: {}
    timeout: {}ms
    min_request_interval: {}ms
    max_history_pages: {}
  Storage:
    path: {}
  Trading:
    chains: {}
  Take Profit:
    tp1: {}x ({}%)
    tp2: {}x ({}%)
    tp3: {}x ({}%)
  Filtering:
    max_token_age_live: {}d
    max_token_age_backtest: {}d
    min_liquidity: ${}
  Signals:
    min_flow_score: {}
    min_smart_money_traders: {}
    min_smart_money_volume: ${}
  Flow:
    positive_min_score: {}
    strong_min_score: {}
    strong_min_smart_money_wallets: {}
    strong_min_smart_money_flow: ${}
  Monitor:
    interval: {}s
    entry_lookback: {}d
    timeframe: {}
    accumulation_window: {}m
  Backtest:
    seed: {}
    chain: {}
    window: {}d
    lookback: {}d
    strategies: {}
"#,
            self.provider.base_url,
            mask_key(&self.provider.api_key),
            self.provider.timeout_ms,
            self.provider.min_request_interval_ms,
            self.provider.max_history_pages,
            if self.storage.path.is_empty() {
                "(in memory)"
            } else {
                self.storage.path.as_str()
            },
            chains.join(", "),
            self.take_profit.tp1.multiplier,
            self.take_profit.tp1.percent,
            self.take_profit.tp2.multiplier,
            self.take_profit.tp2.percent,
            self.take_profit.tp3.multiplier,
            self.take_profit.tp3.percent,
            self.filtering.max_token_age_live_days,
            self.filtering.max_token_age_backtest_days,
            self.filtering.min_liquidity_usd,
            self.signals.min_flow_score,
            self.signals.min_smart_money_traders,
            self.signals.min_smart_money_volume_usd,
            self.flow.positive_min_score,
            self.flow.strong_min_score,
            self.flow.strong_min_smart_money_wallets,
            self.flow.strong_min_smart_money_flow_usd,
            self.monitor.interval_secs,
            self.monitor.entry_lookback_days,
            self.monitor.timeframe,
            self.monitor.accumulation_window_minutes,
            self.backtest
                .seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "(entropy)".to_string()),
            self.backtest.chain,
            self.backtest.window_days,
            self.backtest.lookback_days,
            strategies.join(", "),
        )
    }
}

/// Mask an API key for display, keeping the last four characters
fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count == 0 {
        "(not set)".to_string()
    } else if count <= 4 {
        "***".to_string()
    } else {
        let tail: String = key.chars().skip(count - 4).collect();
        format!("***{}", tail)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            storage: StorageConfig::default(),
            trading: TradingConfig::default(),
            take_profit: TakeProfitConfig::default(),
            filtering: FilteringConfig::default(),
            signals: SignalPolicy::default(),
            flow: FlowThresholds::default(),
            monitor: MonitorConfig::default(),
            backtest: BacktestConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::types::EntryStrategy;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.take_profit.tp1.multiplier, 2.0);
        assert_eq!(config.take_profit.tp2.percent, 30.0);
        assert_eq!(config.take_profit.tp3.multiplier, 10.0);
        assert_eq!(config.filtering.min_liquidity_usd, 100_000.0);
        assert_eq!(config.signals.min_flow_score, 50);
        assert_eq!(config.signals.min_smart_money_traders, 2);
        assert_eq!(config.monitor.interval_secs, 300);
        assert_eq!(config.monitor.timeframe, Timeframe::OneDay);
        assert_eq!(config.backtest.strategies.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terminal.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[provider]
api_key = "abcdef123456"

[trading]
chains = ["ethereum", "base"]

[take_profit.tp1]
multiplier = 1.5
percent = 40.0

[signals]
min_flow_score = 60

[flow]
strong_min_score = 80

[monitor]
timeframe = "6h"

[backtest]
seed = 42

[[backtest.strategies]]
name = "Accumulation Pattern"
entry_strategy = "accumulation"
min_smart_money_count = 3
"#
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.provider.api_key, "abcdef123456");
        assert_eq!(config.trading.chains, vec![Chain::Ethereum, Chain::Base]);
        assert_eq!(config.take_profit.tp1.multiplier, 1.5);
        // Untouched levels keep their defaults
        assert_eq!(config.take_profit.tp2.multiplier, 5.0);
        assert_eq!(config.signals.min_flow_score, 60);
        assert_eq!(config.signals.min_smart_money_traders, 2);
        assert_eq!(config.flow.strong_min_score, 80);
        assert_eq!(config.flow.positive_min_score, 50);
        assert_eq!(config.monitor.timeframe, Timeframe::SixHours);
        assert_eq!(config.backtest.seed, Some(42));
        assert_eq!(config.backtest.strategies.len(), 1);
        assert_eq!(
            config.backtest.strategies[0].entry_strategy,
            EntryStrategy::Accumulation
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.take_profit.tp2.multiplier = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.take_profit.tp3.percent = 120.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.trading.chains.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.flow.strong_min_score = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_descending_take_profit_only_warns() {
        let mut config = Config::default();
        config.take_profit.tp1.multiplier = 8.0;
        assert!(!config.take_profit.is_ascending());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_signal_policy_takes_liquidity_floor() {
        let mut config = Config::default();
        config.filtering.min_liquidity_usd = 250_000.0;
        let policy = config.signal_policy();
        assert_eq!(policy.min_liquidity_usd, 250_000.0);
        assert_eq!(policy.min_smart_money_volume_usd, 10_000.0);
    }

    #[test]
    fn test_require_provider_credentials() {
        let mut config = Config::default();
        assert!(config.require_provider_credentials().is_err());
        config.provider.api_key = "key".to_string();
        assert!(config.require_provider_credentials().is_ok());
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "(not set)");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key("supersecret1234"), "***1234");

        let mut config = Config::default();
        config.provider.api_key = "supersecret1234".to_string();
        let display = config.masked_display();
        assert!(display.contains("***1234"));
        assert!(!display.contains("supersecret"));
    }
}
