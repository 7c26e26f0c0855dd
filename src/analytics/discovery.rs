//! Token discovery aggregation
//!
//! Folds a chain's smart money DEX trades into one record per bought token.
//! Identity fields come from the first trade seen; later trades add to the
//! volume and can only raise the liquidity estimate.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::provider::types::SmartMoneyDexTrade;
use crate::types::{Chain, Token};

/// Liquidity is estimated as this multiple of a single trade's value
pub const LIQUIDITY_ESTIMATE_MULTIPLIER: f64 = 10.0;

/// Aggregated view of one token across trades
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredToken {
    pub address: String,
    pub symbol: String,
    pub age_days: f64,
    pub market_cap_usd: f64,
    pub liquidity_estimate_usd: f64,
    pub price_estimate_usd: f64,
    pub total_volume_usd: f64,
}

impl DiscoveredToken {
    fn from_trade(trade: &SmartMoneyDexTrade) -> Self {
        Self {
            address: trade.token_bought_address.clone(),
            symbol: trade.token_bought_symbol.clone(),
            age_days: trade.token_bought_age_days,
            market_cap_usd: trade.token_bought_market_cap_usd,
            liquidity_estimate_usd: trade.trade_value_usd * LIQUIDITY_ESTIMATE_MULTIPLIER,
            price_estimate_usd: price_estimate(trade),
            total_volume_usd: trade.trade_value_usd,
        }
    }

    fn merge(&mut self, trade: &SmartMoneyDexTrade) {
        self.total_volume_usd += trade.trade_value_usd;
        self.liquidity_estimate_usd = self
            .liquidity_estimate_usd
            .max(trade.trade_value_usd * LIQUIDITY_ESTIMATE_MULTIPLIER);
    }

    pub fn into_token(self, chain: Chain, discovered_at: DateTime<Utc>) -> Token {
        Token {
            chain,
            address: self.address,
            symbol: self.symbol,
            discovered_at,
            token_age_days: self.age_days,
            market_cap_usd: self.market_cap_usd,
            liquidity_usd: self.liquidity_estimate_usd,
            first_seen_price_usd: self.price_estimate_usd,
        }
    }
}

/// USD per token, 0 when the amount is unknown
fn price_estimate(trade: &SmartMoneyDexTrade) -> f64 {
    if trade.token_bought_amount > 0.0 {
        trade.trade_value_usd / trade.token_bought_amount
    } else {
        0.0
    }
}

/// Insertion-ordered, address-keyed aggregation
#[derive(Debug, Default)]
pub struct DiscoveredTokens {
    tokens: Vec<DiscoveredToken>,
    index: HashMap<String, usize>,
}

impl DiscoveredTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a SmartMoneyDexTrade>) -> Self {
        let mut tokens = Self::new();
        for trade in trades {
            tokens.observe(trade);
        }
        tokens
    }

    pub fn observe(&mut self, trade: &SmartMoneyDexTrade) {
        match self.index.get(&trade.token_bought_address) {
            Some(&idx) => self.tokens[idx].merge(trade),
            None => {
                self.index
                    .insert(trade.token_bought_address.clone(), self.tokens.len());
                self.tokens.push(DiscoveredToken::from_trade(trade));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&DiscoveredToken> {
        self.index.get(address).map(|&idx| &self.tokens[idx])
    }

    /// Tokens meeting the liquidity floor, highest volume first.
    /// Equal volumes keep first-seen order.
    pub fn qualifying(self, min_liquidity_usd: f64) -> Vec<DiscoveredToken> {
        let mut kept: Vec<DiscoveredToken> = self
            .tokens
            .into_iter()
            .filter(|t| t.liquidity_estimate_usd >= min_liquidity_usd)
            .collect();
        kept.sort_by(|a, b| b.total_volume_usd.total_cmp(&a.total_volume_usd));
        kept
    }
}
