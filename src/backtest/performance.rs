//! Performance statistics over a sequence of simulated trades

use serde::{Deserialize, Serialize};

use super::types::BacktestTrade;

/// Summary statistics, all zero for an empty run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with a positive return
    pub win_rate: f64,
    pub avg_return_percent: f64,
    pub max_return_percent: f64,
    pub min_return_percent: f64,
    /// Equal-weight mean of per-trade returns (not compounded)
    pub total_return_percent: f64,
    pub max_drawdown_percent: f64,
    pub avg_hold_time_hours: f64,
}

impl PerformanceSummary {
    /// Aggregate trades in the order given; drawdown depends on that order
    pub fn from_trades(trades: &[BacktestTrade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let returns: Vec<f64> = trades.iter().map(|t| t.return_percent).collect();
        let n = trades.len() as f64;

        let winning_trades = returns.iter().filter(|&&r| r > 0.0).count();
        let mean = returns.iter().sum::<f64>() / n;

        Self {
            total_trades: trades.len(),
            winning_trades,
            losing_trades: trades.len() - winning_trades,
            win_rate: winning_trades as f64 / n * 100.0,
            avg_return_percent: mean,
            max_return_percent: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min_return_percent: returns.iter().copied().fold(f64::INFINITY, f64::min),
            total_return_percent: mean,
            max_drawdown_percent: max_drawdown(&cumulative_returns(&returns)),
            avg_hold_time_hours: trades.iter().map(|t| t.hold_time_hours).sum::<f64>() / n,
        }
    }
}

/// Running sum of returns, starting at 0
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    let mut series = Vec::with_capacity(returns.len() + 1);
    let mut current = 0.0;
    series.push(current);
    for r in returns {
        current += r;
        series.push(current);
    }
    series
}

/// Largest peak-to-trough decline of a cumulative series
pub fn max_drawdown(series: &[f64]) -> f64 {
    let Some(&first) = series.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut worst = 0.0_f64;
    for &value in series {
        peak = peak.max(value);
        worst = worst.max(peak - value);
    }
    worst
}
