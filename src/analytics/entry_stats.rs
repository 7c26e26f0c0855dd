//! Smart money entry statistics for one token

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::TradeEntry;

/// Aggregate view over a token's smart money entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryStatistics {
    /// Distinct trader addresses (not row count)
    pub trader_count: usize,
    pub total_volume_usd: f64,
    /// Arithmetic mean of entry prices, not volume weighted
    pub average_entry_price_usd: f64,
    /// Earliest entry by timestamp
    pub first_entry: Option<TradeEntry>,
}

impl EntryStatistics {
    pub fn from_entries(entries: &[TradeEntry]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let trader_count = entries
            .iter()
            .map(|e| e.trader_address.as_str())
            .collect::<HashSet<_>>()
            .len();
        let total_volume_usd = entries.iter().map(|e| e.value_usd).sum();
        let average_entry_price_usd =
            entries.iter().map(|e| e.price_usd).sum::<f64>() / entries.len() as f64;

        // min_by_key keeps the first of equal timestamps
        let first_entry = entries.iter().min_by_key(|e| e.timestamp).cloned();

        Self {
            trader_count,
            total_volume_usd,
            average_entry_price_usd,
            first_entry,
        }
    }
}
