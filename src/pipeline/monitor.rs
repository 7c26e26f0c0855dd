//! Live monitor
//!
//! One cycle runs four phases over freshly discovered tokens:
//! discovery, entry ingestion, flow analysis and signal generation.
//! Failures are per token: the token is skipped and the cycle goes on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ingest::{EntryIngestor, TokenDiscovery};
use crate::analytics::accumulation::AccumulationDetector;
use crate::analytics::flow::{FlowAnalysis, FlowScorer};
use crate::analytics::signal::{Signal, SignalEngine};
use crate::config::Config;
use crate::error::Result;
use crate::provider::MarketDataProvider;
use crate::storage::Repository;
use crate::types::{Chain, Timeframe, Token, TokenKey};

/// Counts for one monitor cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub tokens_discovered: usize,
    pub entries_ingested: usize,
    pub flows_analyzed: usize,
    pub signals_generated: usize,
    /// Tokens skipped because they already carry an open signal
    pub already_signaled: usize,
    /// Tokens dropped by a provider or storage failure
    pub token_errors: usize,
}

/// Periodic discovery-to-signal loop
pub struct LiveMonitor {
    provider: Arc<dyn MarketDataProvider>,
    repository: Arc<dyn Repository>,
    discovery: TokenDiscovery,
    ingestor: EntryIngestor,
    scorer: FlowScorer,
    engine: SignalEngine,
    detector: AccumulationDetector,
    chains: Vec<Chain>,
    max_token_age_days: f64,
    lookback_days: i64,
    timeframe: Timeframe,
    interval: Duration,
}

impl LiveMonitor {
    pub fn new(
        config: &Config,
        provider: Arc<dyn MarketDataProvider>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let scorer = FlowScorer::new(config.flow.clone());
        Self {
            discovery: TokenDiscovery::new(
                provider.clone(),
                repository.clone(),
                config.filtering.min_liquidity_usd,
            ),
            ingestor: EntryIngestor::new(provider.clone(), repository.clone()),
            engine: SignalEngine::new(
                config.signal_policy(),
                config.take_profit.clone(),
                scorer.clone(),
            ),
            scorer,
            detector: AccumulationDetector::new(config.monitor.accumulation_window_minutes),
            chains: config.trading.chains.clone(),
            max_token_age_days: config.filtering.max_token_age_live_days,
            lookback_days: config.monitor.entry_lookback_days,
            timeframe: config.monitor.timeframe,
            interval: Duration::from_secs(config.monitor.interval_secs),
            provider,
            repository,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run cycles until `cancel` fires. A running cycle is allowed to finish.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Live monitor started: chains={:?}, interval={}s",
            self.chains,
            self.interval.as_secs()
        );

        let mut cycle = 0u64;
        while !cancel.is_cancelled() {
            cycle += 1;
            info!("Starting monitor cycle {}", cycle);

            match self.run_cycle().await {
                Ok(report) => info!("Cycle {} complete: {:?}", cycle, report),
                Err(e) => error!("Cycle {} failed: {}", cycle, e),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Live monitor stopped after {} cycles", cycle);
        Ok(())
    }

    /// One full pass over newly discovered tokens
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        // Phase 1: discovery
        let tokens = self
            .discovery
            .discover(&self.chains, self.max_token_age_days)
            .await;
        report.tokens_discovered = tokens.len();
        if tokens.is_empty() {
            info!("No tokens discovered this cycle");
            return Ok(report);
        }

        // Phase 2: entries
        let mut ingested = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.ingestor.ingest(&token, self.lookback_days).await {
                Ok(count) => {
                    report.entries_ingested += count;
                    ingested.push(token);
                }
                Err(e) => {
                    warn!("Entry ingestion failed for {}: {}", token.symbol, e);
                    report.token_errors += 1;
                }
            }
        }

        // Phase 3: flow
        let mut analyzed: Vec<(Token, FlowAnalysis)> = Vec::with_capacity(ingested.len());
        for token in ingested {
            match self.analyze_flow(&token).await {
                Ok(analysis) => {
                    report.flows_analyzed += 1;
                    analyzed.push((token, analysis));
                }
                Err(e) => {
                    warn!("Flow analysis failed for {}: {}", token.symbol, e);
                    report.token_errors += 1;
                }
            }
        }

        // Phase 4: signals
        let open: HashSet<TokenKey> = self
            .repository
            .active_signals()
            .await?
            .into_iter()
            .map(|s| TokenKey::new(s.chain, s.token_address))
            .collect();

        for (token, analysis) in &analyzed {
            if open.contains(&token.key()) {
                debug!("Open signal already exists for {}", token.symbol);
                report.already_signaled += 1;
                continue;
            }

            match self.generate_signal(token, analysis).await {
                Ok(Some(signal)) => {
                    report.signals_generated += 1;
                    info!(
                        "BUY signal #{} for {} @ ${:.8} (score {}, {} traders)",
                        signal.id.unwrap_or_default(),
                        signal.symbol,
                        signal.entry_price_usd,
                        signal.flow_score,
                        signal.smart_money_count
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Signal generation failed for {}: {}", token.symbol, e);
                    report.token_errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Fetch, score and store the token's flow
    async fn analyze_flow(&self, token: &Token) -> Result<FlowAnalysis> {
        let snapshot = self
            .provider
            .flow_snapshot(token.chain, &token.address, self.timeframe)
            .await?;

        let mut analysis = self.scorer.analyze(snapshot);
        analysis.id = Some(self.repository.insert_flow_analysis(analysis.clone()).await?);

        debug!(
            "Flow for {}: score={} sm=${:.0} whale=${:.0}",
            token.symbol,
            analysis.score,
            analysis.snapshot.smart_money_net_flow_usd,
            analysis.snapshot.whale_net_flow_usd
        );
        if self.scorer.has_strong_flow(&analysis) {
            info!("Strong smart money flow on {}", token.symbol);
        }
        Ok(analysis)
    }

    /// Evaluate and store a signal; `None` when a gate rejects the token
    async fn generate_signal(&self, token: &Token, analysis: &FlowAnalysis) -> Result<Option<Signal>> {
        let (entries, stats) = self.ingestor.statistics(token).await?;

        let accumulation = self.detector.detect(&entries);
        if accumulation.has_accumulation {
            info!(
                "Accumulation on {}: {} traders, ${:.0} within {} minutes",
                token.symbol,
                accumulation.trader_count,
                accumulation.total_volume_usd,
                self.detector.window().num_minutes()
            );
        }

        let Some(mut signal) = self.engine.evaluate(token, analysis, &stats).signal() else {
            return Ok(None);
        };

        signal.id = Some(self.repository.insert_signal(signal.clone()).await?);
        Ok(Some(signal))
    }
}
