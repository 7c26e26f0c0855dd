//! Smart Money Terminal Library
//!
//! Flow scoring, buy signal generation and strategy backtesting driven by
//! smart money wallet activity.

pub mod analytics;
pub mod backtest;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
