//! Segwit-light CLI Application
//!
//! Inspect the activation policy and walk the unconfirmed-spend scenarios
//! around it on an in-memory node.

use clap::{Parser, Subcommand};
use segwit_light::cli::{self, AppState};
use segwit_light::core::{SystemClock, TimeSource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "segwit-light")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Unconfirmed-spend policy around the segwit-light activation", long_about = None)]
struct Cli {
    /// JSON config file (defaults are used for missing fields)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Activation time override (unix seconds)
    #[arg(long)]
    activation_time: Option<i64>,

    /// Mempool window override (seconds)
    #[arg(long)]
    mempool_window: Option<u64>,

    /// Wallet window override (seconds)
    #[arg(long)]
    wallet_window: Option<u64>,

    /// Never let the wallet spend unconfirmed outputs
    #[arg(long)]
    no_zero_conf_change: bool,

    /// Mining difficulty override (leading zero bits)
    #[arg(short, long)]
    difficulty: Option<u32>,

    /// Coinbase maturity override (blocks)
    #[arg(long)]
    coinbase_maturity: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the policy zone at a time
    Zone {
        /// Unix seconds (defaults to now)
        #[arg(short, long)]
        time: Option<i64>,
    },

    /// Try unconfirmed spends at offsets around activation
    Simulate,

    /// Show the effective configuration
    Config {
        /// Also write it to this file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut state = AppState::new(cli.config.as_deref())?;
    apply_overrides(&mut state, &cli);
    state.config.validate()?;

    match cli.command {
        Commands::Zone { time } => {
            let time = time.unwrap_or_else(|| SystemClock.now());
            cli::cmd_zone(&state, time)?;
        }

        Commands::Simulate => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_simulate(&state))?;
        }

        Commands::Config { save } => {
            cli::cmd_config(&state)?;
            if let Some(path) = save {
                cli::cmd_config_save(&state, &path)?;
            }
        }
    }

    Ok(())
}

fn apply_overrides(state: &mut AppState, cli: &Cli) {
    let config = &mut state.config;
    if let Some(time) = cli.activation_time {
        config.activation_time = time;
    }
    if let Some(window) = cli.mempool_window {
        config.mempool_window_secs = window;
    }
    if let Some(window) = cli.wallet_window {
        config.wallet_window_secs = window;
    }
    if cli.no_zero_conf_change {
        config.spend_zero_conf_change = false;
    }
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(maturity) = cli.coinbase_maturity {
        config.coinbase_maturity = maturity;
    }
}
