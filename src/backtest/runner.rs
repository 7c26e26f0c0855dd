//! Backtest runner
//!
//! Replays stored discoveries through each configured strategy, then
//! aggregates and persists the outcome.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::performance::PerformanceSummary;
use super::simulator::{BacktestSimulator, TradeCandidate};
use super::types::{BacktestResult, BacktestTrade, EntryStrategy, StrategyConfig, StrategyDefinition};
use crate::analytics::accumulation::AccumulationDetector;
use crate::analytics::flow::FlowScorer;
use crate::analytics::signal::TakeProfitConfig;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::EntryIngestor;
use crate::provider::MarketDataProvider;
use crate::storage::Repository;
use crate::types::{Chain, Timeframe, Token};

/// Outcome of one strategy run
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub trades: Vec<BacktestTrade>,
    /// Skipped candidates by reason code
    pub skipped: BTreeMap<&'static str, usize>,
}

pub struct BacktestRunner<R: Rng = StdRng> {
    provider: Arc<dyn MarketDataProvider>,
    repository: Arc<dyn Repository>,
    ingestor: EntryIngestor,
    scorer: FlowScorer,
    detector: AccumulationDetector,
    simulator: BacktestSimulator<R>,
    chain: Chain,
    window: Duration,
    lookback_days: i64,
    token_scan_limit: usize,
    min_liquidity_usd: f64,
    take_profit: TakeProfitConfig,
    timeframe: Timeframe,
}

impl BacktestRunner<StdRng> {
    /// Runner seeded from `seed`, falling back to the configured seed
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn MarketDataProvider>,
        repository: Arc<dyn Repository>,
        seed: Option<u64>,
    ) -> Self {
        let seed = seed.or(config.backtest.seed);
        match seed {
            Some(s) => info!("Backtest RNG seeded with {}", s),
            None => debug!("Backtest RNG seeded from entropy"),
        }
        Self::new(config, provider, repository, BacktestSimulator::seeded(seed))
    }
}

impl<R: Rng> BacktestRunner<R> {
    pub fn new(
        config: &Config,
        provider: Arc<dyn MarketDataProvider>,
        repository: Arc<dyn Repository>,
        simulator: BacktestSimulator<R>,
    ) -> Self {
        Self {
            ingestor: EntryIngestor::new(provider.clone(), repository.clone()),
            scorer: FlowScorer::new(config.flow.clone()),
            detector: AccumulationDetector::new(config.monitor.accumulation_window_minutes),
            simulator,
            chain: config.backtest.chain,
            window: Duration::days(config.backtest.window_days),
            lookback_days: config.backtest.lookback_days,
            token_scan_limit: config.backtest.token_scan_limit,
            min_liquidity_usd: config.filtering.min_liquidity_usd,
            take_profit: config.take_profit.clone(),
            timeframe: config.monitor.timeframe,
            provider,
            repository,
        }
    }

    /// Run every strategy over the window ending now
    pub async fn run(&mut self, definitions: &[StrategyDefinition]) -> Result<Vec<BacktestReport>> {
        let end = Utc::now();
        let start = end - self.window;
        self.run_window(definitions, start, end).await
    }

    /// Run every strategy over tokens discovered within `[start, end]`.
    /// Candidates are built once and shared by all strategies.
    pub async fn run_window(
        &mut self,
        definitions: &[StrategyDefinition],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BacktestReport>> {
        info!(
            "Running {} strategies on {} from {} to {}",
            definitions.len(),
            self.chain,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let tokens = self.select_tokens(start, end).await?;
        info!("Found {} tokens to backtest", tokens.len());

        let flow_gate = definitions
            .iter()
            .filter(|d| d.entry_strategy == EntryStrategy::FlowConfirmation)
            .map(|d| d.min_smart_money_count)
            .min();
        let candidates = self.build_candidates(tokens, flow_gate).await;

        let mut reports = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let strategy = StrategyConfig::from_definition(
                definition,
                self.chain,
                start,
                end,
                self.min_liquidity_usd,
                self.take_profit.clone(),
            );
            reports.push(self.run_strategy(&strategy, &candidates).await?);
        }
        Ok(reports)
    }

    /// Stored tokens on this chain discovered inside the window
    pub async fn select_tokens(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Token>> {
        let tokens = self
            .repository
            .recent_tokens(self.token_scan_limit)
            .await?
            .into_iter()
            .filter(|t| t.chain == self.chain && t.discovered_at >= start && t.discovered_at <= end)
            .collect();
        Ok(tokens)
    }

    /// Ingest history and gather analytics per token. Failing tokens are dropped.
    ///
    /// `flow_gate` is the lowest trader count any flow confirmation strategy
    /// accepts; live flow is fetched only for tokens that could reach the
    /// flow check.
    async fn build_candidates(&self, tokens: Vec<Token>, flow_gate: Option<usize>) -> Vec<TradeCandidate> {
        let mut candidates = Vec::with_capacity(tokens.len());

        for token in tokens {
            if let Err(e) = self.ingestor.ingest(&token, self.lookback_days).await {
                warn!("Skipping {}: entry ingestion failed: {}", token.symbol, e);
                continue;
            }

            let (entries, stats) = match self.ingestor.statistics(&token).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Skipping {}: {}", token.symbol, e);
                    continue;
                }
            };

            let reaches_flow_check = flow_gate.is_some_and(|min_traders| {
                stats.first_entry.is_some()
                    && stats.trader_count >= min_traders
                    && token.liquidity_usd >= self.min_liquidity_usd
            });
            let flow_score = if reaches_flow_check {
                self.flow_score(&token).await
            } else {
                None
            };

            candidates.push(TradeCandidate {
                accumulation: self.detector.detect(&entries),
                token,
                stats,
                flow_score,
            });
        }

        candidates
    }

    /// Score a live flow snapshot and store it; `None` when the provider fails
    async fn flow_score(&self, token: &Token) -> Option<u8> {
        let snapshot = match self
            .provider
            .flow_snapshot(token.chain, &token.address, self.timeframe)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Flow unavailable for {}: {}", token.symbol, e);
                return None;
            }
        };

        let analysis = self.scorer.analyze(snapshot);
        let score = analysis.score;
        if let Err(e) = self.repository.insert_flow_analysis(analysis).await {
            warn!("Failed to store flow analysis for {}: {}", token.symbol, e);
        }
        Some(score)
    }

    /// Simulate, aggregate and persist one strategy
    pub async fn run_strategy(
        &mut self,
        strategy: &StrategyConfig,
        candidates: &[TradeCandidate],
    ) -> Result<BacktestReport> {
        let mut trades = Vec::new();
        let mut skipped: BTreeMap<&'static str, usize> = BTreeMap::new();

        for candidate in candidates {
            match self.simulator.simulate(candidate, strategy) {
                Ok(trade) => trades.push(trade),
                Err(reason) => {
                    debug!("{}: skipped {}: {}", strategy.name, candidate.token.symbol, reason);
                    *skipped.entry(reason.code()).or_default() += 1;
                }
            }
        }

        // Drawdown follows simulation order
        let summary = PerformanceSummary::from_trades(&trades);

        let mut result = BacktestResult {
            id: None,
            strategy_name: strategy.name.clone(),
            chain: strategy.chain,
            start_date: strategy.start,
            end_date: strategy.end,
            total_signals: summary.total_trades,
            winning_trades: summary.winning_trades,
            losing_trades: summary.losing_trades,
            win_rate: summary.win_rate,
            avg_return_percent: summary.avg_return_percent,
            max_return_percent: summary.max_return_percent,
            min_return_percent: summary.min_return_percent,
            total_return_percent: summary.total_return_percent,
            max_drawdown_percent: summary.max_drawdown_percent,
            avg_hold_time_hours: summary.avg_hold_time_hours,
            metadata: serde_json::to_value(strategy)?,
            created_at: Utc::now(),
        };

        let result_id = self.repository.insert_backtest_result(result.clone()).await?;
        result.id = Some(result_id);

        for trade in &mut trades {
            trade.result_id = Some(result_id);
            trade.id = Some(self.repository.insert_backtest_trade(trade.clone()).await?);
        }

        info!(
            "{}: {} trades, win rate {:.1}%, avg return {:.2}%, max drawdown {:.2}%, avg hold {:.1}h",
            strategy.name,
            summary.total_trades,
            summary.win_rate,
            summary.avg_return_percent,
            summary.max_drawdown_percent,
            summary.avg_hold_time_hours
        );
        if !skipped.is_empty() {
            debug!("{}: skipped {:?}", strategy.name, skipped);
        }

        Ok(BacktestReport {
            result,
            trades,
            skipped,
        })
    }
}
