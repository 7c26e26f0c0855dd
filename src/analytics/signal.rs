//! Buy Signal Generation
//!
//! A token becomes a signal when its flow and smart money entries pass five
//! gates, checked in order (first failure wins):
//! 1. Flow score at or above the minimum
//! 2. Flow is positive
//! 3. Enough distinct smart money traders
//! 4. Enough smart money volume
//! 5. Enough liquidity
//!
//! Passing tokens get a take-profit ladder from configured multipliers and
//! an independent ladder of Fibonacci extensions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::entry_stats::EntryStatistics;
use super::fibonacci::FibonacciLevels;
use super::flow::{FlowAnalysis, FlowScorer};
use crate::types::{Chain, Token};

/// One take-profit target from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitTarget {
    /// Price multiple of the entry
    pub multiplier: f64,
    /// Share of the position released at this level
    pub percent: f64,
}

/// Configured take-profit ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitConfig {
    #[serde(default = "default_tp1")]
    pub tp1: TakeProfitTarget,
    #[serde(default = "default_tp2")]
    pub tp2: TakeProfitTarget,
    #[serde(default = "default_tp3")]
    pub tp3: TakeProfitTarget,
}

fn default_tp1() -> TakeProfitTarget {
    TakeProfitTarget { multiplier: 2.0, percent: 50.0 }
}
fn default_tp2() -> TakeProfitTarget {
    TakeProfitTarget { multiplier: 5.0, percent: 30.0 }
}
fn default_tp3() -> TakeProfitTarget {
    TakeProfitTarget { multiplier: 10.0, percent: 100.0 }
}

impl Default for TakeProfitConfig {
    fn default() -> Self {
        Self {
            tp1: default_tp1(),
            tp2: default_tp2(),
            tp3: default_tp3(),
        }
    }
}

impl TakeProfitConfig {
    pub fn targets(&self) -> [TakeProfitTarget; 3] {
        [self.tp1, self.tp2, self.tp3]
    }

    /// Whether multipliers increase from tp1 to tp3
    pub fn is_ascending(&self) -> bool {
        self.tp1.multiplier < self.tp2.multiplier && self.tp2.multiplier < self.tp3.multiplier
    }
}

/// A priced take-profit level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    pub price: f64,
    pub exit_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLadder {
    pub tp1: TakeProfitLevel,
    pub tp2: TakeProfitLevel,
    pub tp3: TakeProfitLevel,
}

impl TakeProfitLadder {
    pub fn from_entry(entry_price: f64, config: &TakeProfitConfig) -> Self {
        let level = |target: TakeProfitTarget| TakeProfitLevel {
            price: entry_price * target.multiplier,
            exit_percent: target.percent,
        };
        Self {
            tp1: level(config.tp1),
            tp2: level(config.tp2),
            tp3: level(config.tp3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
}

/// Signal lifecycle: active -> tp1_hit/tp2_hit/tp3_hit -> closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Active,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    Closed,
}

impl SignalStatus {
    fn rank(&self) -> u8 {
        match self {
            SignalStatus::Active => 0,
            SignalStatus::Tp1Hit => 1,
            SignalStatus::Tp2Hit => 2,
            SignalStatus::Tp3Hit => 3,
            SignalStatus::Closed => 4,
        }
    }

    /// Statuses only move forward; levels may be skipped, closed is terminal
    pub fn can_transition_to(&self, next: SignalStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, SignalStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active => "active",
            SignalStatus::Tp1Hit => "tp1_hit",
            SignalStatus::Tp2Hit => "tp2_hit",
            SignalStatus::Tp3Hit => "tp3_hit",
            SignalStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An emitted buy signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Assigned by the repository
    #[serde(default)]
    pub id: Option<u64>,
    pub chain: Chain,
    pub token_address: String,
    pub symbol: String,
    pub signal_type: SignalType,
    pub generated_at: DateTime<Utc>,
    pub entry_price_usd: f64,
    #[serde(default)]
    pub current_price_usd: Option<f64>,

    // Entry analysis
    pub first_smart_money_entry_price: f64,
    pub first_smart_money_entry_time: DateTime<Utc>,
    pub smart_money_count: usize,
    pub total_smart_money_volume_usd: f64,

    // Flow analysis
    pub flow_score: u8,
    pub smart_money_flow_usd: f64,
    pub whale_flow_usd: f64,
    pub public_figure_flow_usd: f64,

    pub take_profit: TakeProfitLadder,
    pub fibonacci: FibonacciLevels,

    pub status: SignalStatus,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub final_return_percent: Option<f64>,
}

impl Signal {
    /// Furthest take-profit level reached at `price`
    pub fn status_for_price(&self, price: f64) -> SignalStatus {
        if price >= self.take_profit.tp3.price {
            SignalStatus::Tp3Hit
        } else if price >= self.take_profit.tp2.price {
            SignalStatus::Tp2Hit
        } else if price >= self.take_profit.tp1.price {
            SignalStatus::Tp1Hit
        } else {
            SignalStatus::Active
        }
    }

    pub fn return_percent_at(&self, price: f64) -> f64 {
        if self.entry_price_usd == 0.0 {
            return 0.0;
        }
        (price - self.entry_price_usd) / self.entry_price_usd * 100.0
    }
}

/// Why a token did not produce a signal
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    FlowScoreTooLow { score: u8 },
    FlowNotPositive,
    TooFewTraders { count: usize },
    VolumeTooLow { volume_usd: f64 },
    LiquidityTooLow { liquidity_usd: f64 },
    NoFirstEntry,
}

impl RejectReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::FlowScoreTooLow { .. } => "flow_score_too_low",
            RejectReason::FlowNotPositive => "flow_not_positive",
            RejectReason::TooFewTraders { .. } => "too_few_traders",
            RejectReason::VolumeTooLow { .. } => "volume_too_low",
            RejectReason::LiquidityTooLow { .. } => "liquidity_too_low",
            RejectReason::NoFirstEntry => "no_first_entry",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::FlowScoreTooLow { score } => write!(f, "Flow score too low: {}", score),
            RejectReason::FlowNotPositive => write!(f, "Flow is not positive"),
            RejectReason::TooFewTraders { count } => {
                write!(f, "Not enough smart money traders: {}", count)
            }
            RejectReason::VolumeTooLow { volume_usd } => {
                write!(f, "Total volume too low: ${:.0}", volume_usd)
            }
            RejectReason::LiquidityTooLow { liquidity_usd } => {
                write!(f, "Liquidity too low: ${:.0}", liquidity_usd)
            }
            RejectReason::NoFirstEntry => write!(f, "No first entry found"),
        }
    }
}

/// Outcome of evaluating one token
#[derive(Debug, Clone, PartialEq)]
pub enum SignalDecision {
    Generate(Box<Signal>),
    Skip(RejectReason),
}

impl SignalDecision {
    pub fn signal(self) -> Option<Signal> {
        match self {
            SignalDecision::Generate(signal) => Some(*signal),
            SignalDecision::Skip(_) => None,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            SignalDecision::Generate(_) => None,
            SignalDecision::Skip(reason) => Some(reason),
        }
    }
}

/// Gate thresholds for signal emission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPolicy {
    #[serde(default = "default_min_flow_score")]
    pub min_flow_score: u8,
    #[serde(default = "default_min_traders")]
    pub min_smart_money_traders: usize,
    #[serde(default = "default_min_volume")]
    pub min_smart_money_volume_usd: f64,
    /// Filled from `filtering.min_liquidity_usd`
    #[serde(skip, default = "default_min_liquidity")]
    pub min_liquidity_usd: f64,
}

fn default_min_flow_score() -> u8 { 50 }
fn default_min_traders() -> usize { 2 }
fn default_min_volume() -> f64 { 10_000.0 }
fn default_min_liquidity() -> f64 { 100_000.0 }

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            min_flow_score: default_min_flow_score(),
            min_smart_money_traders: default_min_traders(),
            min_smart_money_volume_usd: default_min_volume(),
            min_liquidity_usd: default_min_liquidity(),
        }
    }
}

/// Eligibility gate and ladder builder
#[derive(Debug, Clone)]
pub struct SignalEngine {
    policy: SignalPolicy,
    take_profit: TakeProfitConfig,
    scorer: FlowScorer,
}

impl SignalEngine {
    pub fn new(policy: SignalPolicy, take_profit: TakeProfitConfig, scorer: FlowScorer) -> Self {
        Self {
            policy,
            take_profit,
            scorer,
        }
    }

    pub fn policy(&self) -> &SignalPolicy {
        &self.policy
    }

    /// Run the gates, returning the first failure
    pub fn check_gates(
        &self,
        token: &Token,
        flow: &FlowAnalysis,
        stats: &EntryStatistics,
    ) -> Result<(), RejectReason> {
        if flow.score < self.policy.min_flow_score {
            return Err(RejectReason::FlowScoreTooLow { score: flow.score });
        }

        if !self.scorer.is_positive(flow) {
            return Err(RejectReason::FlowNotPositive);
        }

        if stats.trader_count < self.policy.min_smart_money_traders {
            return Err(RejectReason::TooFewTraders {
                count: stats.trader_count,
            });
        }

        if stats.total_volume_usd < self.policy.min_smart_money_volume_usd {
            return Err(RejectReason::VolumeTooLow {
                volume_usd: stats.total_volume_usd,
            });
        }

        if token.liquidity_usd < self.policy.min_liquidity_usd {
            return Err(RejectReason::LiquidityTooLow {
                liquidity_usd: token.liquidity_usd,
            });
        }

        Ok(())
    }

    /// Decide whether `token` deserves a buy signal
    pub fn evaluate(
        &self,
        token: &Token,
        flow: &FlowAnalysis,
        stats: &EntryStatistics,
    ) -> SignalDecision {
        if let Err(reason) = self.check_gates(token, flow, stats) {
            debug!("Signal not generated for {}: {}", token.symbol, reason);
            return SignalDecision::Skip(reason);
        }

        let Some(first_entry) = stats.first_entry.as_ref() else {
            debug!("No first entry found for {}", token.symbol);
            return SignalDecision::Skip(RejectReason::NoFirstEntry);
        };

        let entry_price = if token.first_seen_price_usd > 0.0 {
            token.first_seen_price_usd
        } else {
            stats.average_entry_price_usd
        };

        let signal = Signal {
            id: None,
            chain: token.chain,
            token_address: token.address.clone(),
            symbol: token.symbol.clone(),
            signal_type: SignalType::Buy,
            generated_at: Utc::now(),
            entry_price_usd: entry_price,
            current_price_usd: Some(entry_price),
            first_smart_money_entry_price: first_entry.price_usd,
            first_smart_money_entry_time: first_entry.timestamp,
            smart_money_count: stats.trader_count,
            total_smart_money_volume_usd: stats.total_volume_usd,
            flow_score: flow.score,
            smart_money_flow_usd: flow.snapshot.smart_money_net_flow_usd,
            whale_flow_usd: flow.snapshot.whale_net_flow_usd,
            public_figure_flow_usd: flow.snapshot.public_figure_net_flow_usd,
            take_profit: TakeProfitLadder::from_entry(entry_price, &self.take_profit),
            fibonacci: FibonacciLevels::extensions(entry_price),
            status: SignalStatus::Active,
            closed_at: None,
            final_return_percent: None,
        };

        SignalDecision::Generate(Box::new(signal))
    }
}
