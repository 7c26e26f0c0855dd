//! Async pipeline around the analytics core

pub mod ingest;
pub mod monitor;

#[cfg(test)]
pub(crate) mod testing;

pub use ingest::{entries_from_trades, EntryIngestor, TokenDiscovery};
pub use monitor::{CycleReport, LiveMonitor};
