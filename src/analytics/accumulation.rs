//! Accumulation Pattern Detection
//!
//! Scans a token's smart money buys for a time window in which several
//! distinct wallets bought together. Every entry is tried as a window start,
//! which is quadratic in the entry count. Per-token entry counts are in the
//! tens, so no indexing is done.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::TradeEntry;

/// Distinct traders required for a window to qualify
pub const MIN_ACCUMULATION_TRADERS: usize = 3;

/// Best accumulation window found for a token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulationWindow {
    pub has_accumulation: bool,
    /// Timestamp of the entry that opened the winning window
    pub start: Option<DateTime<Utc>>,
    /// Distinct traders inside the winning window
    pub trader_count: usize,
    /// USD volume inside the winning window
    pub total_volume_usd: f64,
}

impl AccumulationWindow {
    fn none() -> Self {
        Self::default()
    }
}

/// Sliding-window accumulation detector
#[derive(Debug, Clone)]
pub struct AccumulationDetector {
    window: Duration,
}

impl AccumulationDetector {
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window: Duration::minutes(window_minutes),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Find the window with the most distinct traders.
    ///
    /// Entries are expected in timestamp order. A window is
    /// `[start, start + window]`, inclusive on both ends.
    pub fn detect(&self, entries: &[TradeEntry]) -> AccumulationWindow {
        if entries.len() < MIN_ACCUMULATION_TRADERS {
            return AccumulationWindow::none();
        }

        let mut best = AccumulationWindow::none();

        for candidate in entries {
            let window_start = candidate.timestamp;
            let window_end = window_start + self.window;

            let mut traders: HashSet<&str> = HashSet::new();
            let mut volume = 0.0;
            for entry in entries
                .iter()
                .filter(|e| e.timestamp >= window_start && e.timestamp <= window_end)
            {
                traders.insert(entry.trader_address.as_str());
                volume += entry.value_usd;
            }

            let unique = traders.len();
            // Only a strictly larger count replaces the current best
            if unique >= MIN_ACCUMULATION_TRADERS && unique > best.trader_count {
                best = AccumulationWindow {
                    has_accumulation: true,
                    start: Some(window_start),
                    trader_count: unique,
                    total_volume_usd: volume,
                };
            }
        }

        best
    }
}

impl Default for AccumulationDetector {
    fn default() -> Self {
        Self::new(60)
    }
}
