//! Smart Money Terminal - flow scoring, buy signals and backtests
//!
//! Signals and backtests are informational. Nothing here places trades.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use smart_money_terminal::cli::commands;
use smart_money_terminal::config::Config;

/// Smart Money Terminal
#[derive(Parser)]
#[command(name = "terminal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "terminal.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tokens, score flow and generate signals
    Monitor {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Backtest configured strategies over recent discoveries
    Backtest {
        /// Strategy name or entry strategy (default: all)
        #[arg(short, long)]
        strategy: Option<String>,

        /// RNG seed (overrides backtest.seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Discover tokens on the backtest chain before running
        #[arg(long)]
        discover: bool,
    },

    /// Show stored signals
    Signals {
        /// Only signals that are not closed
        #[arg(long)]
        active: bool,

        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a current price for a signal
    Track {
        /// Signal ID
        id: u64,

        /// Current price in USD
        price: f64,
    },

    /// Close a signal
    Close {
        /// Signal ID
        id: u64,

        /// Final return percent (default: return at last tracked price)
        #[arg(long = "return", value_name = "PERCENT", allow_hyphen_values = true)]
        final_return: Option<f64>,
    },

    /// Show backtest results
    Results {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Show the trades of this result ID
        #[arg(long, value_name = "ID")]
        trades: Option<u64>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("smart_money_terminal=info")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Monitor { once } => commands::monitor(&config, once).await,
        Commands::Backtest {
            strategy,
            seed,
            discover,
        } => commands::backtest(&config, strategy.as_deref(), seed, discover).await,
        Commands::Signals {
            active,
            limit,
            json,
        } => commands::signals(&config, active, limit, json).await,
        Commands::Track { id, price } => commands::track(&config, id, price).await,
        Commands::Close { id, final_return } => commands::close(&config, id, final_return).await,
        Commands::Results {
            limit,
            trades,
            json,
        } => commands::results(&config, limit, trades, json).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
