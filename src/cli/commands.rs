//! CLI command implementations

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analytics::signal::{Signal, SignalStatus};
use crate::backtest::{BacktestReport, BacktestResult, BacktestRunner, BacktestTrade, StrategyDefinition};
use crate::config::Config;
use crate::pipeline::{LiveMonitor, TokenDiscovery};
use crate::provider::NansenClient;
use crate::storage::{JsonStore, Repository};

async fn open_store(config: &Config) -> Result<Arc<JsonStore>> {
    let store = JsonStore::from_config_path(&config.storage.path).await?;
    Ok(Arc::new(store))
}

fn open_provider(config: &Config) -> Result<Arc<NansenClient>> {
    config.require_provider_credentials()?;
    Ok(Arc::new(NansenClient::new(&config.provider)?))
}

/// Run the live monitor, once or until Ctrl-C
pub async fn monitor(config: &Config, once: bool) -> Result<()> {
    let provider = open_provider(config)?;
    let store = open_store(config).await?;
    let monitor = LiveMonitor::new(config, provider, store);

    if once {
        let report = monitor.run_cycle().await?;
        println!("\n=== MONITOR CYCLE ===\n");
        println!("Tokens discovered:  {}", report.tokens_discovered);
        println!("Entries ingested:   {}", report.entries_ingested);
        println!("Flows analyzed:     {}", report.flows_analyzed);
        println!("Signals generated:  {}", report.signals_generated);
        println!("Already signaled:   {}", report.already_signaled);
        println!("Token errors:       {}", report.token_errors);
        println!();
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current cycle");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    monitor.run(cancel).await?;
    Ok(())
}

/// Pick strategies by name or entry strategy; all when no filter
fn select_strategies(
    definitions: &[StrategyDefinition],
    filter: Option<&str>,
) -> Result<Vec<StrategyDefinition>> {
    let Some(filter) = filter else {
        return Ok(definitions.to_vec());
    };

    let wanted = filter.trim().to_lowercase();
    let selected: Vec<StrategyDefinition> = definitions
        .iter()
        .filter(|d| d.name.to_lowercase() == wanted || d.entry_strategy.as_str() == wanted)
        .cloned()
        .collect();

    if selected.is_empty() {
        let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        bail!("Unknown strategy '{}'. Available: {}", filter, names.join(", "));
    }
    Ok(selected)
}

/// Backtest configured strategies, optionally discovering tokens first
pub async fn backtest(
    config: &Config,
    strategy: Option<&str>,
    seed: Option<u64>,
    discover: bool,
) -> Result<()> {
    let definitions = select_strategies(&config.backtest.strategies, strategy)?;

    let provider = open_provider(config)?;
    let store = open_store(config).await?;

    if discover {
        let discovery = TokenDiscovery::new(
            provider.clone(),
            store.clone(),
            config.filtering.min_liquidity_usd,
        );
        let found = discovery
            .discover(
                &[config.backtest.chain],
                config.filtering.max_token_age_backtest_days,
            )
            .await;
        info!("Discovery before backtest found {} tokens", found.len());
    }

    let mut runner = BacktestRunner::from_config(config, provider, store, seed);

    let reports = runner.run(&definitions).await?;
    print_backtest_reports(&reports);
    Ok(())
}

fn print_backtest_reports(reports: &[BacktestReport]) {
    println!("\n=== BACKTEST RESULTS ===\n");
    println!(
        "{:<6} {:<26} {:>7} {:>8} {:>10} {:>10} {:>10} {:>9}",
        "ID", "STRATEGY", "TRADES", "WIN %", "AVG %", "MAX %", "MAX DD %", "AVG HOLD"
    );
    println!("{}", "-".repeat(94));

    for report in reports {
        let r = &report.result;
        println!(
            "{:<6} {:<26} {:>7} {:>8.1} {:>10.2} {:>10.2} {:>10.2} {:>8.1}h",
            r.id.unwrap_or_default(),
            shorten(&r.strategy_name, 25),
            r.total_signals,
            r.win_rate,
            r.avg_return_percent,
            r.max_return_percent,
            r.max_drawdown_percent,
            r.avg_hold_time_hours
        );
        if !report.skipped.is_empty() {
            let skipped: Vec<String> = report
                .skipped
                .iter()
                .map(|(code, count)| format!("{}={}", code, count))
                .collect();
            println!("       skipped: {}", skipped.join(", "));
        }
    }
    println!();
}

/// List stored signals
pub async fn signals(config: &Config, active: bool, limit: usize, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let mut signals = if active {
        store.active_signals().await?
    } else {
        store.recent_signals(limit).await?
    };
    signals.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&signals)?);
        return Ok(());
    }

    print_signals(&signals, active);
    Ok(())
}

fn print_signals(signals: &[Signal], active: bool) {
    println!("\n=== {} ===\n", if active { "ACTIVE SIGNALS" } else { "RECENT SIGNALS" });
    if signals.is_empty() {
        println!("No signals found.");
        println!();
        return;
    }

    println!(
        "{:<5} {:<17} {:<9} {:<10} {:>14} {:>14} {:>6} {:>6} {:<8}",
        "ID", "GENERATED", "CHAIN", "SYMBOL", "ENTRY", "TP1", "SCORE", "SM", "STATUS"
    );
    println!("{}", "-".repeat(98));

    for s in signals {
        println!(
            "{:<5} {:<17} {:<9} {:<10} {:>14.8} {:>14.8} {:>6} {:>6} {:<8}",
            s.id.unwrap_or_default(),
            s.generated_at.format("%Y-%m-%d %H:%M"),
            s.chain.as_str(),
            shorten(&s.symbol, 9),
            s.entry_price_usd,
            s.take_profit.tp1.price,
            s.flow_score,
            s.smart_money_count,
            s.status.as_str()
        );
    }
    println!();
}

/// Record a price for a signal, advancing it through its take-profit levels
pub async fn track(config: &Config, id: u64, price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        bail!("Price must be positive, got {}", price);
    }

    let store = open_store(config).await?;
    let signal = store.update_signal_price(id, price).await?;
    println!("{}", describe_tracked(&signal, price));
    Ok(())
}

fn describe_tracked(signal: &Signal, price: f64) -> String {
    let nearest = signal.fibonacci.nearest(price);
    format!(
        "Signal {} ({}): ${:.8} ({:+.2}%) status={} nearest {}=${:.8}",
        signal.id.unwrap_or_default(),
        signal.symbol,
        price,
        signal.return_percent_at(price),
        signal.status,
        nearest.level,
        nearest.price
    )
}

/// Close a signal, optionally with an explicit final return
pub async fn close(config: &Config, id: u64, final_return: Option<f64>) -> Result<()> {
    let store = open_store(config).await?;
    let signal = store
        .update_signal_status(id, SignalStatus::Closed, final_return)
        .await?;
    match signal.final_return_percent {
        Some(r) => println!("Signal {} ({}) closed at {:+.2}%", id, signal.symbol, r),
        None => println!("Signal {} ({}) closed", id, signal.symbol),
    }
    Ok(())
}

/// List backtest results, or the trades of one result
pub async fn results(config: &Config, limit: usize, trades: Option<u64>, json: bool) -> Result<()> {
    let store = open_store(config).await?;

    if let Some(result_id) = trades {
        let trades = store.trades_for_result(result_id).await?;
        if trades.is_empty() {
            warn!("No trades stored for result {}", result_id);
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&trades)?);
        } else {
            print_trades(result_id, &trades);
        }
        return Ok(());
    }

    let results = store.recent_backtest_results(limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }
    Ok(())
}

fn print_results(results: &[BacktestResult]) {
    println!("\n=== BACKTEST HISTORY ===\n");
    if results.is_empty() {
        println!("No backtest results found.");
        println!();
        return;
    }

    println!(
        "{:<6} {:<17} {:<26} {:<9} {:>7} {:>8} {:>10} {:>10}",
        "ID", "RUN AT", "STRATEGY", "CHAIN", "TRADES", "WIN %", "TOTAL %", "MAX DD %"
    );
    println!("{}", "-".repeat(100));

    for r in results {
        println!(
            "{:<6} {:<17} {:<26} {:<9} {:>7} {:>8.1} {:>10.2} {:>10.2}",
            r.id.unwrap_or_default(),
            r.created_at.format("%Y-%m-%d %H:%M"),
            shorten(&r.strategy_name, 25),
            r.chain.as_str(),
            r.total_signals,
            r.win_rate,
            r.total_return_percent,
            r.max_drawdown_percent
        );
    }
    println!();
}

fn print_trades(result_id: u64, trades: &[BacktestTrade]) {
    println!("\n=== TRADES FOR RESULT {} ===\n", result_id);
    if trades.is_empty() {
        println!("No trades found.");
        println!();
        return;
    }

    println!(
        "{:<10} {:<17} {:>14} {:>14} {:>10} {:>8} {:<10}",
        "SYMBOL", "ENTRY", "ENTRY $", "EXIT $", "RETURN %", "HOLD", "EXIT"
    );
    println!("{}", "-".repeat(89));

    for t in trades {
        println!(
            "{:<10} {:<17} {:>14.8} {:>14.8} {:>10.2} {:>7.1}h {:<10}",
            shorten(&t.symbol, 9),
            t.entry_date.format("%Y-%m-%d %H:%M"),
            t.entry_price,
            t.exit_price,
            t.return_percent,
            t.hold_time_hours,
            t.exit_reason.as_str()
        );
    }
    println!();
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
