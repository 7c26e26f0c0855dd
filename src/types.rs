//! Core on-chain records shared by analytics, backtesting and storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Chains supported by the wallet-intelligence provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Solana,
    Base,
    Bnb,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Solana => "solana",
            Chain::Base => "base",
            Chain::Bnb => "bnb",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Avalanche => "avalanche",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" => Ok(Chain::Ethereum),
            "solana" => Ok(Chain::Solana),
            "base" => Ok(Chain::Base),
            "bnb" => Ok(Chain::Bnb),
            "polygon" => Ok(Chain::Polygon),
            "arbitrum" => Ok(Chain::Arbitrum),
            "optimism" => Ok(Chain::Optimism),
            "avalanche" => Ok(Chain::Avalanche),
            other => Err(Error::Config(format!("Unknown chain: {}", other))),
        }
    }
}

/// Aggregation window for flow lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "10m")]
    TenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "5m",
            Timeframe::TenMinutes => "10m",
            Timeframe::OneHour => "1h",
            Timeframe::SixHours => "6h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "24h",
            Timeframe::SevenDays => "7d",
            Timeframe::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5m" => Ok(Timeframe::FiveMinutes),
            "10m" => Ok(Timeframe::TenMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "6h" => Ok(Timeframe::SixHours),
            "12h" => Ok(Timeframe::TwelveHours),
            "24h" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            other => Err(Error::Config(format!("Unknown timeframe: {}", other))),
        }
    }
}

/// Identity of a token: unique per (chain, address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    pub chain: Chain,
    pub address: String,
}

impl TokenKey {
    pub fn new(chain: Chain, address: impl Into<String>) -> Self {
        Self {
            chain,
            address: address.into(),
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// A newly discovered token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub chain: Chain,
    /// Contract / mint address
    pub address: String,
    pub symbol: String,
    pub discovered_at: DateTime<Utc>,
    pub token_age_days: f64,
    pub market_cap_usd: f64,
    /// Liquidity estimate in USD
    pub liquidity_usd: f64,
    /// Price observed at discovery (0 when unknown)
    pub first_seen_price_usd: f64,
}

impl Token {
    pub fn key(&self) -> TokenKey {
        TokenKey::new(self.chain, self.address.clone())
    }
}

/// One observed buy of a token by a flagged wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub chain: Chain,
    pub token_address: String,
    pub trader_address: String,
    pub trader_label: String,
    pub timestamp: DateTime<Utc>,
    /// Execution price in USD
    pub price_usd: f64,
    /// Trade size in USD
    pub value_usd: f64,
    /// Unique across all entries
    pub transaction_hash: String,
    /// Chronologically first entry for this token in its ingestion batch
    pub is_first_entry: bool,
}

/// Point-in-time wallet-category flow read for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub chain: Chain,
    pub token_address: String,
    pub timeframe: Timeframe,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub smart_money_net_flow_usd: f64,
    #[serde(default)]
    pub smart_money_wallet_count: u32,
    #[serde(default)]
    pub whale_net_flow_usd: f64,
    #[serde(default)]
    pub whale_wallet_count: u32,
    #[serde(default)]
    pub public_figure_net_flow_usd: f64,
    #[serde(default)]
    pub public_figure_wallet_count: u32,
}

impl FlowSnapshot {
    /// Empty snapshot (all flows and counts zero)
    pub fn empty(chain: Chain, token_address: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            chain,
            token_address: token_address.into(),
            timeframe,
            observed_at: Utc::now(),
            smart_money_net_flow_usd: 0.0,
            smart_money_wallet_count: 0,
            whale_net_flow_usd: 0.0,
            whale_wallet_count: 0,
            public_figure_net_flow_usd: 0.0,
            public_figure_wallet_count: 0,
        }
    }

    /// Net flows of the three categories in scoring order
    pub fn category_flows(&self) -> [f64; 3] {
        [
            self.smart_money_net_flow_usd,
            self.whale_net_flow_usd,
            self.public_figure_net_flow_usd,
        ]
    }
}
