//! Trade Simulation
//!
//! Applies an entry rule to a token's historical smart money activity, then
//! draws a stochastic exit. There is no price series behind the exit: the
//! outcome buckets are fixed probabilities.
//!
//! The RNG is injected so runs can be replayed from a seed.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

use super::types::{BacktestTrade, EntryStrategy, ExitReason, StrategyConfig};
use crate::analytics::accumulation::AccumulationWindow;
use crate::analytics::entry_stats::EntryStatistics;
use crate::analytics::signal::TakeProfitConfig;
use crate::types::Token;

/// Everything the simulator knows about one token
#[derive(Debug, Clone)]
pub struct TradeCandidate {
    pub token: Token,
    pub stats: EntryStatistics,
    pub accumulation: AccumulationWindow,
    /// Latest flow score, when one could be fetched
    pub flow_score: Option<u8>,
}

/// Why a candidate produced no trade
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoFirstEntry,
    TooFewTraders { count: usize, required: usize },
    LiquidityTooLow { liquidity_usd: f64, required: f64 },
    NoAccumulation,
    FlowUnavailable,
    FlowScoreTooLow { score: u8, required: u8 },
    InvalidEntryPrice { price: f64 },
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::NoFirstEntry => "no_first_entry",
            SkipReason::TooFewTraders { .. } => "too_few_traders",
            SkipReason::LiquidityTooLow { .. } => "liquidity_too_low",
            SkipReason::NoAccumulation => "no_accumulation",
            SkipReason::FlowUnavailable => "flow_unavailable",
            SkipReason::FlowScoreTooLow { .. } => "flow_score_too_low",
            SkipReason::InvalidEntryPrice { .. } => "invalid_entry_price",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoFirstEntry => write!(f, "No first entry found"),
            SkipReason::TooFewTraders { count, required } => {
                write!(f, "Smart money traders {} below {}", count, required)
            }
            SkipReason::LiquidityTooLow {
                liquidity_usd,
                required,
            } => write!(f, "Liquidity ${:.0} below ${:.0}", liquidity_usd, required),
            SkipReason::NoAccumulation => write!(f, "No accumulation pattern"),
            SkipReason::FlowUnavailable => write!(f, "Flow data unavailable"),
            SkipReason::FlowScoreTooLow { score, required } => {
                write!(f, "Flow score {} below {}", score, required)
            }
            SkipReason::InvalidEntryPrice { price } => write!(f, "Invalid entry price: {}", price),
        }
    }
}

/// Resolve entry price and time, or say why there is none
pub fn entry_point(
    candidate: &TradeCandidate,
    config: &StrategyConfig,
) -> Result<(f64, DateTime<Utc>), SkipReason> {
    let stats = &candidate.stats;
    let first = stats.first_entry.as_ref().ok_or(SkipReason::NoFirstEntry)?;

    if stats.trader_count < config.min_smart_money_count {
        return Err(SkipReason::TooFewTraders {
            count: stats.trader_count,
            required: config.min_smart_money_count,
        });
    }

    if candidate.token.liquidity_usd < config.min_liquidity_usd {
        return Err(SkipReason::LiquidityTooLow {
            liquidity_usd: candidate.token.liquidity_usd,
            required: config.min_liquidity_usd,
        });
    }

    let (price, time) = match config.entry_strategy {
        EntryStrategy::FirstSmartMoney => (first.price_usd, first.timestamp),
        EntryStrategy::Accumulation => {
            let window = &candidate.accumulation;
            let start = window
                .start
                .filter(|_| window.has_accumulation)
                .ok_or(SkipReason::NoAccumulation)?;
            (stats.average_entry_price_usd, start)
        }
        EntryStrategy::FlowConfirmation => {
            let score = candidate.flow_score.ok_or(SkipReason::FlowUnavailable)?;
            if score < config.min_flow_score {
                return Err(SkipReason::FlowScoreTooLow {
                    score,
                    required: config.min_flow_score,
                });
            }
            (first.price_usd, first.timestamp)
        }
    };

    // Return percent is undefined for a zero entry
    if !price.is_finite() || price <= 0.0 {
        return Err(SkipReason::InvalidEntryPrice { price });
    }

    Ok((price, time))
}

/// Drawn exit for a given entry price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedExit {
    pub exit_price: f64,
    pub hold_time_hours: f64,
    pub exit_reason: ExitReason,
    pub return_percent: f64,
}

/// Entry rule + stochastic exit
pub struct BacktestSimulator<R: Rng = StdRng> {
    rng: R,
}

impl BacktestSimulator<StdRng> {
    /// Seeded when `seed` is given, entropy otherwise
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl<R: Rng> BacktestSimulator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw an exit for `entry_price`
    pub fn simulate_exit(&mut self, entry_price: f64, take_profit: &TakeProfitConfig) -> SimulatedExit {
        let exit_reason = ExitReason::from_draw(self.rng.gen::<f64>());

        let (exit_price, hold_time_hours) = match exit_reason {
            ExitReason::Tp3 => (
                entry_price * take_profit.tp3.multiplier,
                24.0 + self.rng.gen::<f64>() * 120.0,
            ),
            ExitReason::Tp2 => (
                entry_price * take_profit.tp2.multiplier,
                12.0 + self.rng.gen::<f64>() * 72.0,
            ),
            ExitReason::Tp1 => (
                entry_price * take_profit.tp1.multiplier,
                6.0 + self.rng.gen::<f64>() * 48.0,
            ),
            ExitReason::TimeLimit => {
                let price = entry_price * (0.8 + self.rng.gen::<f64>() * 0.4);
                (price, 48.0 + self.rng.gen::<f64>() * 120.0)
            }
            ExitReason::StopLoss => {
                let price = entry_price * (0.5 + self.rng.gen::<f64>() * 0.3);
                (price, 2.0 + self.rng.gen::<f64>() * 24.0)
            }
        };

        SimulatedExit {
            exit_price,
            hold_time_hours,
            exit_reason,
            return_percent: (exit_price - entry_price) / entry_price * 100.0,
        }
    }

    /// Simulate one trade. Exit time is the entry time plus the hold.
    pub fn simulate(
        &mut self,
        candidate: &TradeCandidate,
        config: &StrategyConfig,
    ) -> Result<BacktestTrade, SkipReason> {
        let (entry_price, entry_date) = entry_point(candidate, config)?;
        let exit = self.simulate_exit(entry_price, &config.take_profit);
        let hold = Duration::milliseconds((exit.hold_time_hours * 3_600_000.0).round() as i64);

        Ok(BacktestTrade {
            id: None,
            result_id: None,
            token_address: candidate.token.address.clone(),
            symbol: candidate.token.symbol.clone(),
            entry_date,
            entry_price,
            exit_date: entry_date + hold,
            exit_price: exit.exit_price,
            return_percent: exit.return_percent,
            hold_time_hours: exit.hold_time_hours,
            exit_reason: exit.exit_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::ScriptedRng;
    use crate::types::{Chain, TradeEntry};
    use chrono::TimeZone;

    fn entry(trader: &str, minute: i64, price: f64) -> TradeEntry {
        TradeEntry {
            chain: Chain::Solana,
            token_address: "Mint".to_string(),
            trader_address: trader.to_string(),
            trader_label: "Fund".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap() + Duration::minutes(minute),
            price_usd: price,
            value_usd: 1_000.0,
            transaction_hash: format!("{}{}", trader, minute),
            is_first_entry: false,
        }
    }

    fn candidate(entries: &[TradeEntry], liquidity: f64) -> TradeCandidate {
        TradeCandidate {
            token: Token {
                chain: Chain::Solana,
                address: "Mint".to_string(),
                symbol: "MNT".to_string(),
                discovered_at: Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap(),
                token_age_days: 1.0,
                market_cap_usd: 1_000_000.0,
                liquidity_usd: liquidity,
                first_seen_price_usd: 0.0,
            },
            stats: EntryStatistics::from_entries(entries),
            accumulation: AccumulationWindow::default(),
            flow_score: None,
        }
    }

    fn strategy(entry_strategy: EntryStrategy) -> StrategyConfig {
        StrategyConfig {
            name: "test".to_string(),
            chain: Chain::Solana,
            start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap(),
            entry_strategy,
            min_flow_score: 50,
            min_smart_money_count: 2,
            min_liquidity_usd: 100_000.0,
            take_profit: TakeProfitConfig::default(),
            max_hold_days: 7,
        }
    }

    #[test]
    fn test_scripted_rng_round_trips() {
        let mut rng = ScriptedRng::new(&[0.0625, 0.5, 0.875]);
        assert_eq!(rng.gen::<f64>(), 0.0625);
        assert_eq!(rng.gen::<f64>(), 0.5);
        assert_eq!(rng.gen::<f64>(), 0.875);
    }

    #[test]
    fn test_exit_buckets() {
        let tp = TakeProfitConfig::default();

        let mut sim = BacktestSimulator::new(ScriptedRng::new(&[0.0625, 0.5]));
        let exit = sim.simulate_exit(1.0, &tp);
        assert_eq!(exit.exit_reason, ExitReason::Tp3);
        assert_eq!(exit.exit_price, 10.0);
        assert_eq!(exit.hold_time_hours, 84.0);
        assert_eq!(exit.return_percent, 900.0);

        let mut sim = BacktestSimulator::new(ScriptedRng::new(&[0.125, 0.5]));
        let exit = sim.simulate_exit(2.0, &tp);
        assert_eq!(exit.exit_reason, ExitReason::Tp2);
        assert_eq!(exit.exit_price, 10.0);
        assert_eq!(exit.hold_time_hours, 48.0);

        let mut sim = BacktestSimulator::new(ScriptedRng::new(&[0.375, 0.25]));
        let exit = sim.simulate_exit(1.0, &tp);
        assert_eq!(exit.exit_reason, ExitReason::Tp1);
        assert_eq!(exit.exit_price, 2.0);
        assert_eq!(exit.hold_time_hours, 18.0);
        assert_eq!(exit.return_percent, 100.0);
    }

    #[test]
    fn test_time_limit_and_stop_loss_draw_price_then_hold() {
        let tp = TakeProfitConfig::default();

        // price factor 0.8 + 0.5 * 0.4 = 1.0, hold 48 + 0.25 * 120 = 78
        let mut sim = BacktestSimulator::new(ScriptedRng::new(&[0.5, 0.5, 0.25]));
        let exit = sim.simulate_exit(4.0, &tp);
        assert_eq!(exit.exit_reason, ExitReason::TimeLimit);
        assert_eq!(exit.exit_price, 4.0);
        assert_eq!(exit.hold_time_hours, 78.0);
        assert_eq!(exit.return_percent, 0.0);

        // price factor 0.5 + 0 * 0.3 = 0.5, hold 2 + 0.5 * 24 = 14
        let mut sim = BacktestSimulator::new(ScriptedRng::new(&[0.875, 0.0, 0.5]));
        let exit = sim.simulate_exit(4.0, &tp);
        assert_eq!(exit.exit_reason, ExitReason::StopLoss);
        assert_eq!(exit.exit_price, 2.0);
        assert_eq!(exit.hold_time_hours, 14.0);
        assert_eq!(exit.return_percent, -50.0);
    }

    #[test]
    fn test_exit_date_anchored_to_entry() {
        let entries = vec![entry("a", 0, 0.5), entry("b", 10, 1.5)];
        let c = candidate(&entries, 200_000.0);
        let mut sim = BacktestSimulator::new(ScriptedRng::new(&[0.375, 0.25]));

        let trade = sim.simulate(&c, &strategy(EntryStrategy::FirstSmartMoney)).unwrap();
        assert_eq!(trade.entry_price, 0.5);
        assert_eq!(trade.entry_date, entries[0].timestamp);
        assert_eq!(trade.exit_date, entries[0].timestamp + Duration::hours(18));
        assert_eq!(trade.exit_reason, ExitReason::Tp1);
        assert!(trade.result_id.is_none());
    }

    #[test]
    fn test_entry_requirements() {
        let c = candidate(&[], 200_000.0);
        assert_eq!(
            entry_point(&c, &strategy(EntryStrategy::FirstSmartMoney)),
            Err(SkipReason::NoFirstEntry)
        );

        let c = candidate(&[entry("a", 0, 1.0), entry("a", 5, 1.0)], 200_000.0);
        let err = entry_point(&c, &strategy(EntryStrategy::FirstSmartMoney))
            .unwrap_err();
        assert_eq!(err.code(), "too_few_traders");

        let c = candidate(&[entry("a", 0, 1.0), entry("b", 5, 1.0)], 50_000.0);
        let err = entry_point(&c, &strategy(EntryStrategy::FirstSmartMoney))
            .unwrap_err();
        assert_eq!(err.code(), "liquidity_too_low");
    }

    #[test]
    fn test_accumulation_entry_uses_average_and_window_start() {
        let entries = vec![entry("a", 0, 1.0), entry("b", 5, 2.0), entry("c", 9, 3.0)];
        let mut c = candidate(&entries, 200_000.0);
        let config = strategy(EntryStrategy::Accumulation);

        assert_eq!(
            entry_point(&c, &config),
            Err(SkipReason::NoAccumulation)
        );

        let start = entries[1].timestamp;
        c.accumulation = AccumulationWindow {
            has_accumulation: true,
            start: Some(start),
            trader_count: 3,
            total_volume_usd: 3_000.0,
        };
        let (price, time) = entry_point(&c, &config).unwrap();
        assert_eq!(price, 2.0);
        assert_eq!(time, start);
    }

    #[test]
    fn test_flow_confirmation_entry() {
        let entries = vec![entry("a", 0, 1.0), entry("b", 5, 2.0)];
        let mut c = candidate(&entries, 200_000.0);
        let config = strategy(EntryStrategy::FlowConfirmation);

        assert_eq!(
            entry_point(&c, &config),
            Err(SkipReason::FlowUnavailable)
        );

        c.flow_score = Some(49);
        assert_eq!(
            entry_point(&c, &config),
            Err(SkipReason::FlowScoreTooLow { score: 49, required: 50 })
        );

        c.flow_score = Some(50);
        let (price, _) = entry_point(&c, &config).unwrap();
        assert_eq!(price, 1.0);
    }

    #[test]
    fn test_zero_entry_price_skipped() {
        let entries = vec![entry("a", 0, 0.0), entry("b", 5, 0.0)];
        let c = candidate(&entries, 200_000.0);
        let err = entry_point(&c, &strategy(EntryStrategy::FirstSmartMoney))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_entry_price");
    }

    #[test]
    fn test_same_seed_same_trades() {
        let entries = vec![entry("a", 0, 1.0), entry("b", 5, 2.0)];
        let c = candidate(&entries, 200_000.0);
        let config = strategy(EntryStrategy::FirstSmartMoney);

        let mut a = BacktestSimulator::seeded(Some(7));
        let mut b = BacktestSimulator::seeded(Some(7));
        for _ in 0..20 {
            assert_eq!(a.simulate(&c, &config), b.simulate(&c, &config));
        }
    }
}
