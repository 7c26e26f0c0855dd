//! Backtest records and strategy parameters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analytics::signal::TakeProfitConfig;
use crate::types::Chain;

/// Rule that picks the entry price and time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStrategy {
    /// Buy at the first smart money entry
    FirstSmartMoney,
    /// Buy at the average entry once an accumulation window exists
    Accumulation,
    /// Buy at the first entry when flow score confirms
    FlowConfirmation,
}

impl EntryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStrategy::FirstSmartMoney => "first_smart_money",
            EntryStrategy::Accumulation => "accumulation",
            EntryStrategy::FlowConfirmation => "flow_confirmation",
        }
    }
}

impl fmt::Display for EntryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulated exit outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Tp1,
    Tp2,
    Tp3,
    StopLoss,
    TimeLimit,
}

impl ExitReason {
    /// Map a draw in [0, 1) to its outcome bucket.
    ///
    /// | draw         | outcome    |
    /// |--------------|------------|
    /// | [0.00, 0.10) | tp3        |
    /// | [0.10, 0.25) | tp2        |
    /// | [0.25, 0.50) | tp1        |
    /// | [0.50, 0.75) | time_limit |
    /// | [0.75, 1.00) | stop_loss  |
    pub fn from_draw(draw: f64) -> Self {
        if draw < 0.10 {
            ExitReason::Tp3
        } else if draw < 0.25 {
            ExitReason::Tp2
        } else if draw < 0.50 {
            ExitReason::Tp1
        } else if draw < 0.75 {
            ExitReason::TimeLimit
        } else {
            ExitReason::StopLoss
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Tp1 => "tp1",
            ExitReason::Tp2 => "tp2",
            ExitReason::Tp3 => "tp3",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TimeLimit => "time_limit",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named strategy as listed in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub name: String,
    pub entry_strategy: EntryStrategy,
    /// Only used by flow confirmation
    #[serde(default = "default_min_flow_score")]
    pub min_flow_score: u8,
    #[serde(default = "default_min_smart_money_count")]
    pub min_smart_money_count: usize,
    #[serde(default = "default_max_hold_days")]
    pub max_hold_days: u32,
}

fn default_min_flow_score() -> u8 {
    50
}

fn default_min_smart_money_count() -> usize {
    2
}

fn default_max_hold_days() -> u32 {
    7
}

impl StrategyDefinition {
    pub fn new(name: impl Into<String>, entry_strategy: EntryStrategy) -> Self {
        Self {
            name: name.into(),
            entry_strategy,
            min_flow_score: default_min_flow_score(),
            min_smart_money_count: default_min_smart_money_count(),
            max_hold_days: default_max_hold_days(),
        }
    }

    /// The three stock strategies
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("First Smart Money Entry", EntryStrategy::FirstSmartMoney),
            Self {
                min_smart_money_count: 3,
                ..Self::new("Accumulation Pattern", EntryStrategy::Accumulation)
            },
            Self {
                min_flow_score: 60,
                ..Self::new("Flow Confirmation", EntryStrategy::FlowConfirmation)
            },
        ]
    }
}

/// Full parameter set for one backtest run; stored as result metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub chain: Chain,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub entry_strategy: EntryStrategy,
    pub min_flow_score: u8,
    pub min_smart_money_count: usize,
    pub min_liquidity_usd: f64,
    pub take_profit: TakeProfitConfig,
    pub max_hold_days: u32,
}

impl StrategyConfig {
    pub fn from_definition(
        definition: &StrategyDefinition,
        chain: Chain,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_liquidity_usd: f64,
        take_profit: TakeProfitConfig,
    ) -> Self {
        Self {
            name: definition.name.clone(),
            chain,
            start,
            end,
            entry_strategy: definition.entry_strategy,
            min_flow_score: definition.min_flow_score,
            min_smart_money_count: definition.min_smart_money_count,
            min_liquidity_usd,
            take_profit,
            max_hold_days: definition.max_hold_days,
        }
    }
}

/// One simulated trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    #[serde(default)]
    pub id: Option<u64>,
    /// Owning result, stamped when the result is stored
    #[serde(default)]
    pub result_id: Option<u64>,
    pub token_address: String,
    pub symbol: String,
    pub entry_date: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_date: DateTime<Utc>,
    pub exit_price: f64,
    pub return_percent: f64,
    pub hold_time_hours: f64,
    pub exit_reason: ExitReason,
}

/// Aggregated outcome of a strategy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default)]
    pub id: Option<u64>,
    pub strategy_name: String,
    pub chain: Chain,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_signals: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_return_percent: f64,
    pub max_return_percent: f64,
    pub min_return_percent: f64,
    pub total_return_percent: f64,
    pub max_drawdown_percent: f64,
    pub avg_hold_time_hours: f64,
    /// Serialized `StrategyConfig`
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
