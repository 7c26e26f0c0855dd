//! Scoring and signal analytics
//!
//! Everything here is synchronous and pure: callers fetch data, these
//! modules decide.

pub mod accumulation;
pub mod discovery;
pub mod entry_stats;
pub mod fibonacci;
pub mod flow;
pub mod signal;

pub use accumulation::{AccumulationDetector, AccumulationWindow};
pub use discovery::{DiscoveredToken, DiscoveredTokens};
pub use entry_stats::EntryStatistics;
pub use fibonacci::FibonacciLevels;
pub use flow::{FlowAnalysis, FlowScorer, FlowThresholds};
pub use signal::{RejectReason, Signal, SignalDecision, SignalEngine, SignalPolicy, SignalStatus};
