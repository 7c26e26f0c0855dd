//! In-process provider stub and fixtures for pipeline tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::provider::{
    DiscoveryQuery, MarketDataProvider, SmartMoneyDexTrade, TgmDexTrade, TradeAction,
    TradeHistoryQuery,
};
use crate::types::{Chain, FlowSnapshot, Timeframe, Token};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()
}

pub fn buy(hash: &str, trader: &str, minute: i64, price: f64, value: f64) -> TgmDexTrade {
    TgmDexTrade {
        block_timestamp: base_time() + Duration::minutes(minute),
        transaction_hash: hash.to_string(),
        trader_address: trader.to_string(),
        trader_address_label: Some("Smart Trader".to_string()),
        action: TradeAction::Buy,
        token_address: String::new(),
        token_symbol: String::new(),
        token_amount: if price > 0.0 { value / price } else { 0.0 },
        estimated_swap_price_usd: price,
        estimated_value_usd: value,
    }
}

pub fn sell(hash: &str, trader: &str, minute: i64) -> TgmDexTrade {
    TgmDexTrade {
        action: TradeAction::Sell,
        ..buy(hash, trader, minute, 0.01, 100.0)
    }
}

pub fn smart_money_trade(address: &str, value: f64, amount: f64) -> SmartMoneyDexTrade {
    SmartMoneyDexTrade {
        block_timestamp: base_time(),
        transaction_hash: format!("{}-{}", address, value),
        trader_address: "wallet".to_string(),
        trader_address_label: Some("Smart Trader".to_string()),
        token_bought_address: address.to_string(),
        token_bought_symbol: address.to_uppercase(),
        token_bought_amount: amount,
        token_bought_age_days: 0.5,
        token_bought_market_cap_usd: 1_000_000.0,
        trade_value_usd: value,
    }
}

pub fn token(address: &str, liquidity: f64) -> Token {
    Token {
        chain: Chain::Solana,
        address: address.to_string(),
        symbol: address.to_uppercase(),
        discovered_at: Utc::now(),
        token_age_days: 0.5,
        market_cap_usd: 1_000_000.0,
        liquidity_usd: liquidity,
        first_seen_price_usd: 0.0,
    }
}

/// Snapshot scoring 100 with the default scorer
pub fn strong_flow(address: &str) -> FlowSnapshot {
    FlowSnapshot {
        smart_money_net_flow_usd: 250_000.0,
        smart_money_wallet_count: 6,
        whale_net_flow_usd: 150_000.0,
        whale_wallet_count: 3,
        ..FlowSnapshot::empty(Chain::Solana, address, Timeframe::OneDay)
    }
}

/// Replays fixed [0, 1) draws. Values must be dyadic to round-trip exactly.
pub struct ScriptedRng {
    draws: Vec<f64>,
    next: usize,
}

impl ScriptedRng {
    pub fn new(draws: &[f64]) -> Self {
        Self {
            draws: draws.to_vec(),
            next: 0,
        }
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let v = self.draws[self.next % self.draws.len()];
        self.next += 1;
        ((v * (1u64 << 53) as f64) as u64) << 11
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[derive(Default)]
struct StubState {
    flows: HashMap<String, FlowSnapshot>,
    history: HashMap<String, Vec<TgmDexTrade>>,
    discovery: HashMap<Chain, Vec<SmartMoneyDexTrade>>,
    failing_chains: HashSet<Chain>,
    failing_tokens: HashSet<String>,
    last_history_query: Option<TradeHistoryQuery>,
    last_discovery_query: Option<DiscoveryQuery>,
    flow_calls: usize,
}

/// Canned provider; unknown tokens have no trades and an empty flow
#[derive(Default)]
pub struct StubProvider {
    state: Mutex<StubState>,
}

impl StubProvider {
    pub fn set_flow(&self, address: &str, flow: FlowSnapshot) {
        self.state.lock().unwrap().flows.insert(address.to_string(), flow);
    }

    pub fn set_history(&self, address: &str, trades: Vec<TgmDexTrade>) {
        self.state
            .lock()
            .unwrap()
            .history
            .insert(address.to_string(), trades);
    }

    pub fn set_discovery(&self, chain: Chain, trades: Vec<SmartMoneyDexTrade>) {
        self.state.lock().unwrap().discovery.insert(chain, trades);
    }

    pub fn fail_chain(&self, chain: Chain) {
        self.state.lock().unwrap().failing_chains.insert(chain);
    }

    /// Every call touching this token fails
    pub fn fail_token(&self, address: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_tokens
            .insert(address.to_string());
    }

    pub fn last_history_query(&self) -> Option<TradeHistoryQuery> {
        self.state.lock().unwrap().last_history_query.clone()
    }

    pub fn last_discovery_query(&self) -> Option<DiscoveryQuery> {
        self.state.lock().unwrap().last_discovery_query.clone()
    }

    pub fn flow_calls(&self) -> usize {
        self.state.lock().unwrap().flow_calls
    }
}

fn unavailable(what: &str) -> Error {
    Error::ProviderStatus {
        status: 503,
        body: format!("{} unavailable", what),
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    async fn flow_snapshot(
        &self,
        chain: Chain,
        token_address: &str,
        timeframe: Timeframe,
    ) -> Result<FlowSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.flow_calls += 1;
        if state.failing_tokens.contains(token_address) {
            return Err(unavailable(token_address));
        }
        Ok(state
            .flows
            .get(token_address)
            .cloned()
            .unwrap_or_else(|| FlowSnapshot::empty(chain, token_address, timeframe)))
    }

    async fn trade_history(&self, query: &TradeHistoryQuery) -> Result<Vec<TgmDexTrade>> {
        let mut state = self.state.lock().unwrap();
        state.last_history_query = Some(query.clone());
        if state.failing_tokens.contains(&query.token_address) {
            return Err(unavailable(&query.token_address));
        }
        Ok(state
            .history
            .get(&query.token_address)
            .cloned()
            .unwrap_or_default())
    }

    async fn smart_money_trades(&self, query: &DiscoveryQuery) -> Result<Vec<SmartMoneyDexTrade>> {
        let mut state = self.state.lock().unwrap();
        state.last_discovery_query = Some(query.clone());
        if state.failing_chains.contains(&query.chain) {
            return Err(unavailable(query.chain.as_str()));
        }
        Ok(state
            .discovery
            .get(&query.chain)
            .cloned()
            .unwrap_or_default())
    }
}
