//! Strategy backtesting
//!
//! - `simulator`: entry rules and the stochastic exit model
//! - `performance`: win rate, returns and drawdown
//! - `runner`: token selection, persistence and reporting

pub mod performance;
pub mod runner;
pub mod simulator;
pub mod types;

pub use performance::PerformanceSummary;
pub use runner::{BacktestReport, BacktestRunner};
pub use simulator::{BacktestSimulator, SkipReason, TradeCandidate};
pub use types::{
    BacktestResult, BacktestTrade, EntryStrategy, ExitReason, StrategyConfig, StrategyDefinition,
};
