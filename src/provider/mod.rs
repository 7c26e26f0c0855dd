//! Market data provider
//!
//! The pipeline only sees `MarketDataProvider`; `NansenClient` is the HTTP
//! implementation.

pub mod client;
pub mod rate_limit;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Chain, FlowSnapshot, Timeframe};

pub use client::NansenClient;
pub use rate_limit::RateLimiter;
pub use types::{SmartMoneyDexTrade, TgmDexTrade, TradeAction};

/// Trade history lookup for one token
#[derive(Debug, Clone)]
pub struct TradeHistoryQuery {
    pub chain: Chain,
    pub token_address: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub only_smart_money: bool,
    pub action: Option<TradeAction>,
    pub min_value_usd: Option<f64>,
}

/// Smart money DEX trades for discovery on one chain
#[derive(Debug, Clone)]
pub struct DiscoveryQuery {
    pub chain: Chain,
    pub max_token_age_days: f64,
    pub min_trade_value_usd: f64,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Wallet-category flows for a token; all zero when the provider has no data
    async fn flow_snapshot(
        &self,
        chain: Chain,
        token_address: &str,
        timeframe: Timeframe,
    ) -> Result<FlowSnapshot>;

    /// All pages of a token's trade history, oldest first
    async fn trade_history(&self, query: &TradeHistoryQuery) -> Result<Vec<TgmDexTrade>>;

    /// One page of recent smart money DEX trades
    async fn smart_money_trades(&self, query: &DiscoveryQuery) -> Result<Vec<SmartMoneyDexTrade>>;
}
