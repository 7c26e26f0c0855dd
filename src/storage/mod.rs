//! Persistence
//!
//! `Repository` is the seam between the pipeline and storage. `JsonStore`
//! is the bundled implementation: in-memory state with optional JSON file
//! persistence.

pub mod json_store;

use async_trait::async_trait;

use crate::analytics::flow::FlowAnalysis;
use crate::analytics::signal::{Signal, SignalStatus};
use crate::backtest::types::{BacktestResult, BacktestTrade};
use crate::error::Result;
use crate::types::{Chain, Token, TradeEntry};

pub use json_store::JsonStore;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert a token unless (chain, address) exists; returns the stored token
    async fn upsert_token(&self, token: Token) -> Result<Token>;

    async fn find_token(&self, chain: Chain, address: &str) -> Result<Option<Token>>;

    /// Newest discoveries first
    async fn recent_tokens(&self, limit: usize) -> Result<Vec<Token>>;

    /// Returns `false` when the transaction hash is already stored
    async fn insert_entry(&self, entry: TradeEntry) -> Result<bool>;

    /// Entries for a token, oldest first
    async fn entries_for_token(&self, chain: Chain, address: &str) -> Result<Vec<TradeEntry>>;

    async fn insert_flow_analysis(&self, analysis: FlowAnalysis) -> Result<u64>;

    async fn latest_flow_analysis(&self, chain: Chain, address: &str)
        -> Result<Option<FlowAnalysis>>;

    async fn insert_signal(&self, signal: Signal) -> Result<u64>;

    async fn find_signal(&self, id: u64) -> Result<Option<Signal>>;

    /// Signals that are not closed, newest first
    async fn active_signals(&self) -> Result<Vec<Signal>>;

    /// Newest first
    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>>;

    /// Move a signal forward in its lifecycle. Closing stamps `closed_at`
    /// and the final return.
    async fn update_signal_status(
        &self,
        id: u64,
        status: SignalStatus,
        final_return_percent: Option<f64>,
    ) -> Result<Signal>;

    /// Record a price and advance the status to the furthest level reached
    async fn update_signal_price(&self, id: u64, price: f64) -> Result<Signal>;

    async fn insert_backtest_result(&self, result: BacktestResult) -> Result<u64>;

    async fn insert_backtest_trade(&self, trade: BacktestTrade) -> Result<u64>;

    /// Newest first
    async fn recent_backtest_results(&self, limit: usize) -> Result<Vec<BacktestResult>>;

    /// Trades of one result, by entry date
    async fn trades_for_result(&self, result_id: u64) -> Result<Vec<BacktestTrade>>;
}
