//! Token discovery and smart money entry ingestion

use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::analytics::discovery::DiscoveredTokens;
use crate::analytics::entry_stats::EntryStatistics;
use crate::error::Result;
use crate::provider::{DiscoveryQuery, MarketDataProvider, TgmDexTrade, TradeAction, TradeHistoryQuery};
use crate::storage::Repository;
use crate::types::{Chain, Token, TradeEntry};

/// Smallest trade (USD) requested when pulling entry history
pub const MIN_ENTRY_VALUE_USD: f64 = 100.0;

/// Discovery trades must be at least this fraction of the liquidity floor
const DISCOVERY_TRADE_FRACTION: f64 = 0.01;

const UNKNOWN_LABEL: &str = "Unknown";

/// Finds new tokens that smart money is buying
pub struct TokenDiscovery {
    provider: Arc<dyn MarketDataProvider>,
    repository: Arc<dyn Repository>,
    min_liquidity_usd: f64,
}

impl TokenDiscovery {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        repository: Arc<dyn Repository>,
        min_liquidity_usd: f64,
    ) -> Self {
        Self {
            provider,
            repository,
            min_liquidity_usd,
        }
    }

    /// Discover across chains. A failing chain is logged and skipped.
    pub async fn discover(&self, chains: &[Chain], max_age_days: f64) -> Vec<Token> {
        let names: Vec<&str> = chains.iter().map(|c| c.as_str()).collect();
        info!("Discovering tokens on chains: {}", names.join(", "));

        let mut discovered = Vec::new();
        for &chain in chains {
            match self.discover_on_chain(chain, max_age_days).await {
                Ok(tokens) => discovered.extend(tokens),
                Err(e) => error!("Failed to discover tokens on {}: {}", chain, e),
            }
        }

        info!("Discovered {} tokens across all chains", discovered.len());
        discovered
    }

    pub async fn discover_on_chain(&self, chain: Chain, max_age_days: f64) -> Result<Vec<Token>> {
        let query = DiscoveryQuery {
            chain,
            max_token_age_days: max_age_days,
            min_trade_value_usd: self.min_liquidity_usd * DISCOVERY_TRADE_FRACTION,
        };
        let trades = self.provider.smart_money_trades(&query).await?;

        let now = Utc::now();
        let mut saved = Vec::new();
        for candidate in DiscoveredTokens::from_trades(&trades).qualifying(self.min_liquidity_usd) {
            let token = candidate.into_token(chain, now);
            match self.repository.upsert_token(token).await {
                Ok(stored) => saved.push(stored),
                Err(e) => error!("Failed to save token on {}: {}", chain, e),
            }
        }

        info!("Found {} unique tokens on {}", saved.len(), chain);
        Ok(saved)
    }
}

/// Convert provider trades into entries.
///
/// Keeps buys only, flags the first kept row as the first entry and drops
/// repeated transaction hashes within the batch.
pub fn entries_from_trades(chain: Chain, token_address: &str, trades: &[TgmDexTrade]) -> Vec<TradeEntry> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries = Vec::new();

    for trade in trades.iter().filter(|t| t.action == TradeAction::Buy) {
        if !seen.insert(trade.transaction_hash.as_str()) {
            continue;
        }

        entries.push(TradeEntry {
            chain,
            token_address: token_address.to_string(),
            trader_address: trade.trader_address.clone(),
            trader_label: trade
                .trader_address_label
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            timestamp: trade.block_timestamp,
            price_usd: trade.estimated_swap_price_usd,
            value_usd: trade.estimated_value_usd,
            transaction_hash: trade.transaction_hash.clone(),
            is_first_entry: entries.is_empty(),
        });
    }

    entries
}

/// Pulls and stores smart money buys for tokens
pub struct EntryIngestor {
    provider: Arc<dyn MarketDataProvider>,
    repository: Arc<dyn Repository>,
}

impl EntryIngestor {
    pub fn new(provider: Arc<dyn MarketDataProvider>, repository: Arc<dyn Repository>) -> Self {
        Self {
            provider,
            repository,
        }
    }

    /// Fetch and store a token's smart money buys; returns newly stored count
    pub async fn ingest(&self, token: &Token, lookback_days: i64) -> Result<usize> {
        debug!("Analyzing smart money entries for {}", token.symbol);

        let to = Utc::now();
        let query = TradeHistoryQuery {
            chain: token.chain,
            token_address: token.address.clone(),
            from: to - Duration::days(lookback_days),
            to,
            only_smart_money: true,
            action: Some(TradeAction::Buy),
            min_value_usd: Some(MIN_ENTRY_VALUE_USD),
        };
        let trades = self.provider.trade_history(&query).await?;

        let entries = entries_from_trades(token.chain, &token.address, &trades);
        if entries.is_empty() {
            info!("No smart money buys found for {}", token.symbol);
            return Ok(0);
        }

        let first_seen = entries[0].timestamp;
        let mut stored = 0;
        for entry in entries {
            if self.repository.insert_entry(entry).await? {
                stored += 1;
            }
        }

        info!(
            "Saved {} smart money entries for {} (first: {})",
            stored, token.symbol, first_seen
        );
        Ok(stored)
    }

    /// All stored entries for a token with their statistics
    pub async fn statistics(&self, token: &Token) -> Result<(Vec<TradeEntry>, EntryStatistics)> {
        let entries = self
            .repository
            .entries_for_token(token.chain, &token.address)
            .await?;
        let stats = EntryStatistics::from_entries(&entries);
        Ok((entries, stats))
    }
}
