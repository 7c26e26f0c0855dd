//! JSON-file backed repository
//!
//! Holds all records in memory behind a `RwLock`. With a path configured
//! the whole state is loaded on open and written back after every
//! mutation.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::Repository;
use crate::analytics::flow::FlowAnalysis;
use crate::analytics::signal::{Signal, SignalStatus};
use crate::backtest::types::{BacktestResult, BacktestTrade};
use crate::error::{Error, Result};
use crate::types::{Chain, Token, TokenKey, TradeEntry};

/// Next id per record kind; ids start at 1
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdCounters {
    flow_analysis: u64,
    signal: u64,
    backtest_result: u64,
    backtest_trade: u64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            flow_analysis: 1,
            signal: 1,
            backtest_result: 1,
            backtest_trade: 1,
        }
    }
}

fn take_id(counter: &mut u64) -> u64 {
    let id = *counter;
    *counter += 1;
    id
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    tokens: Vec<Token>,
    #[serde(default)]
    entries: Vec<TradeEntry>,
    #[serde(default)]
    flow_analyses: Vec<FlowAnalysis>,
    #[serde(default)]
    signals: Vec<Signal>,
    #[serde(default)]
    backtest_results: Vec<BacktestResult>,
    #[serde(default)]
    backtest_trades: Vec<BacktestTrade>,
    #[serde(default)]
    next_ids: IdCounters,

    #[serde(skip)]
    token_index: HashMap<TokenKey, usize>,
    #[serde(skip)]
    entry_hashes: HashSet<String>,
}

impl StoreState {
    fn rebuild_indexes(&mut self) {
        self.token_index = self
            .tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.key(), i))
            .collect();
        self.entry_hashes = self
            .entries
            .iter()
            .map(|e| e.transaction_hash.clone())
            .collect();
    }

    fn signal_mut(&mut self, id: u64) -> Result<&mut Signal> {
        self.signals
            .iter_mut()
            .find(|s| s.id == Some(id))
            .ok_or_else(|| Error::NotFound(format!("signal {}", id)))
    }
}

/// In-memory repository with optional JSON persistence
#[derive(Clone)]
pub struct JsonStore {
    state: Arc<RwLock<StoreState>>,
    path: Option<PathBuf>,
}

impl JsonStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            path: None,
        }
    }

    /// Open a store backed by `path`, loading it when present
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            path: Some(path.as_ref().to_path_buf()),
        };
        store.load().await?;
        Ok(store)
    }

    /// Open from a configured path; empty means in-memory
    pub async fn from_config_path(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            Ok(Self::in_memory())
        } else {
            Self::open(path).await
        }
    }

    /// Load state from disk
    pub async fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))?;
        let mut loaded: StoreState = serde_json::from_str(&data)
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;
        loaded.rebuild_indexes();

        let mut guard = self.state.write().await;
        *guard = loaded;

        info!(
            "Loaded {} tokens, {} entries, {} signals from {}",
            guard.tokens.len(),
            guard.entries.len(),
            guard.signals.len(),
            path.display()
        );
        Ok(())
    }

    /// Write state to disk (no-op in memory)
    async fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("create {}: {}", parent.display(), e)))?;
        }

        let data = serde_json::to_string_pretty(state)?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", path.display(), e)))?;

        debug!("Saved store to {}", path.display());
        Ok(())
    }

    /// Apply `change` to a staged copy and persist it; memory only takes the
    /// copy once the write succeeds
    async fn commit<T, F>(&self, state: &mut StoreState, change: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T> + Send,
        T: Send,
    {
        if self.path.is_none() {
            return change(state);
        }

        let mut staged = state.clone();
        let out = change(&mut staged)?;
        self.persist(&staged).await?;
        *state = staged;
        Ok(out)
    }
}

#[async_trait]
impl Repository for JsonStore {
    async fn upsert_token(&self, token: Token) -> Result<Token> {
        let mut state = self.state.write().await;
        let key = token.key();

        if let Some(&idx) = state.token_index.get(&key) {
            return Ok(state.tokens[idx].clone());
        }

        let saved = token.clone();
        self.commit(&mut state, move |s| {
            s.token_index.insert(key, s.tokens.len());
            s.tokens.push(saved);
            Ok(())
        })
        .await?;

        debug!("Token saved: {} ({}) on {}", token.symbol, token.address, token.chain);
        Ok(token)
    }

    async fn find_token(&self, chain: Chain, address: &str) -> Result<Option<Token>> {
        let state = self.state.read().await;
        Ok(state
            .token_index
            .get(&TokenKey::new(chain, address))
            .map(|&idx| state.tokens[idx].clone()))
    }

    async fn recent_tokens(&self, limit: usize) -> Result<Vec<Token>> {
        let state = self.state.read().await;
        let mut tokens = state.tokens.clone();
        tokens.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));
        tokens.truncate(limit);
        Ok(tokens)
    }

    async fn insert_entry(&self, entry: TradeEntry) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.entry_hashes.contains(&entry.transaction_hash) {
            debug!("Entry already exists: {}", entry.transaction_hash);
            return Ok(false);
        }

        self.commit(&mut state, move |s| {
            s.entry_hashes.insert(entry.transaction_hash.clone());
            s.entries.push(entry);
            Ok(true)
        })
        .await
    }

    async fn entries_for_token(&self, chain: Chain, address: &str) -> Result<Vec<TradeEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<TradeEntry> = state
            .entries
            .iter()
            .filter(|e| e.chain == chain && e.token_address == address)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn insert_flow_analysis(&self, mut analysis: FlowAnalysis) -> Result<u64> {
        let mut state = self.state.write().await;
        self.commit(&mut state, move |s| {
            let id = take_id(&mut s.next_ids.flow_analysis);
            analysis.id = Some(id);
            s.flow_analyses.push(analysis);
            Ok(id)
        })
        .await
    }

    async fn latest_flow_analysis(
        &self,
        chain: Chain,
        address: &str,
    ) -> Result<Option<FlowAnalysis>> {
        let state = self.state.read().await;
        Ok(state
            .flow_analyses
            .iter()
            .filter(|f| f.snapshot.chain == chain && f.snapshot.token_address == address)
            .max_by_key(|f| (f.snapshot.observed_at, f.id))
            .cloned())
    }

    async fn insert_signal(&self, mut signal: Signal) -> Result<u64> {
        let mut state = self.state.write().await;
        self.commit(&mut state, move |s| {
            let id = take_id(&mut s.next_ids.signal);
            signal.id = Some(id);
            s.signals.push(signal);
            Ok(id)
        })
        .await
    }

    async fn find_signal(&self, id: u64) -> Result<Option<Signal>> {
        let state = self.state.read().await;
        Ok(state.signals.iter().find(|s| s.id == Some(id)).cloned())
    }

    async fn active_signals(&self) -> Result<Vec<Signal>> {
        let state = self.state.read().await;
        let mut signals: Vec<Signal> = state
            .signals
            .iter()
            .filter(|s| s.status.is_open())
            .cloned()
            .collect();
        signals.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(signals)
    }

    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>> {
        let state = self.state.read().await;
        let mut signals = state.signals.clone();
        signals.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        signals.truncate(limit);
        Ok(signals)
    }

    async fn update_signal_status(
        &self,
        id: u64,
        status: SignalStatus,
        final_return_percent: Option<f64>,
    ) -> Result<Signal> {
        let mut state = self.state.write().await;
        let updated = self
            .commit(&mut state, move |s| {
                let signal = s.signal_mut(id)?;

                if !signal.status.can_transition_to(status) {
                    return Err(Error::InvalidStatusTransition {
                        from: signal.status.to_string(),
                        to: status.to_string(),
                    });
                }

                signal.status = status;
                if status == SignalStatus::Closed {
                    let at_last_price = signal
                        .current_price_usd
                        .map(|price| signal.return_percent_at(price));
                    signal.closed_at = Some(Utc::now());
                    signal.final_return_percent = final_return_percent.or(at_last_price);
                }
                Ok(signal.clone())
            })
            .await?;

        info!("Signal {} ({}) -> {}", id, updated.symbol, updated.status);
        Ok(updated)
    }

    async fn update_signal_price(&self, id: u64, price: f64) -> Result<Signal> {
        let mut state = self.state.write().await;
        let previous = state.signal_mut(id)?.status;
        let updated = self
            .commit(&mut state, move |s| {
                let signal = s.signal_mut(id)?;
                signal.current_price_usd = Some(price);
                let reached = signal.status_for_price(price);
                if signal.status.can_transition_to(reached) {
                    signal.status = reached;
                }
                Ok(signal.clone())
            })
            .await?;

        if updated.status != previous {
            info!("Signal {} ({}) reached {}", id, updated.symbol, updated.status);
        }
        Ok(updated)
    }

    async fn insert_backtest_result(&self, mut result: BacktestResult) -> Result<u64> {
        let mut state = self.state.write().await;
        self.commit(&mut state, move |s| {
            let id = take_id(&mut s.next_ids.backtest_result);
            result.id = Some(id);
            s.backtest_results.push(result);
            Ok(id)
        })
        .await
    }

    async fn insert_backtest_trade(&self, mut trade: BacktestTrade) -> Result<u64> {
        let mut state = self.state.write().await;
        self.commit(&mut state, move |s| {
            let id = take_id(&mut s.next_ids.backtest_trade);
            trade.id = Some(id);
            s.backtest_trades.push(trade);
            Ok(id)
        })
        .await
    }

    async fn recent_backtest_results(&self, limit: usize) -> Result<Vec<BacktestResult>> {
        let state = self.state.read().await;
        let mut results = state.backtest_results.clone();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        results.truncate(limit);
        Ok(results)
    }

    async fn trades_for_result(&self, result_id: u64) -> Result<Vec<BacktestTrade>> {
        let state = self.state.read().await;
        let mut trades: Vec<BacktestTrade> = state
            .backtest_trades
            .iter()
            .filter(|t| t.result_id == Some(result_id))
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.entry_date);
        Ok(trades)
    }
}
