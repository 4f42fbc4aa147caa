use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_config::{ConfigMode, OutputFormat};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod csv_input;

use commands::CommandContext;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "FIFO lot-matching ledger for broker trade statements", long_about = None)]
struct Cli {
    /// Layered config YAML paths in merge order (later overrides earlier)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Realized P&L per symbol and per month
    Pnl {
        /// Trade CSV files (statements are merged and sorted)
        #[arg(long = "trades", required = true, num_args = 1..)]
        trades: Vec<String>,

        /// First trade date (inclusive), YYYYMMDD or YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,

        /// Last trade date (inclusive), YYYYMMDD or YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,

        /// kv | json
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Match each symbol on its own worker
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// Residual cost basis of open long lots over the full history
    CostBasis {
        #[arg(long = "trades", required = true, num_args = 1..)]
        trades: Vec<String>,

        #[arg(long)]
        format: Option<OutputFormat>,

        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// Commission spend by symbol and asset category
    Commissions {
        #[arg(long = "trades", required = true, num_args = 1..)]
        trades: Vec<String>,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Dividend income net of withholding tax, by symbol
    Dividends {
        /// Cash-transaction CSV files
        #[arg(long = "cash", required = true, num_args = 1..)]
        cash: Vec<String>,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Open positions with cost basis filled in from the ledger
    Positions {
        /// Full trade history used for the cost-basis projection
        #[arg(long = "trades", required = true, num_args = 1..)]
        trades: Vec<String>,

        /// Open-position CSV files
        #[arg(long = "positions", required = true, num_args = 1..)]
        positions: Vec<String>,

        /// Window for the realized P&L total
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        format: Option<OutputFormat>,

        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn init_tracing() {
    // stdout carries the report; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let out = match cli.cmd {
        Commands::Pnl {
            trades,
            from,
            to,
            format,
            parallel,
        } => {
            let ctx = CommandContext::load(&cli.config_paths, ConfigMode::Pnl)?;
            let trades = csv_input::load_trade_files(&trades)?;
            info!(trades = trades.len(), "pnl");
            commands::pnl::run(
                &ctx,
                &trades,
                &commands::pnl::PnlArgs {
                    from: from.as_deref(),
                    to: to.as_deref(),
                    format,
                    parallel,
                },
            )?
        }
        Commands::CostBasis {
            trades,
            format,
            parallel,
        } => {
            let ctx = CommandContext::load(&cli.config_paths, ConfigMode::CostBasis)?;
            let trades = csv_input::load_trade_files(&trades)?;
            info!(trades = trades.len(), "cost-basis");
            commands::cost_basis::run(&ctx, &trades, format, parallel)?
        }
        Commands::Commissions {
            trades,
            from,
            to,
            format,
        } => {
            let ctx = CommandContext::load(&cli.config_paths, ConfigMode::Commissions)?;
            let trades = csv_input::load_trade_files(&trades)?;
            info!(trades = trades.len(), "commissions");
            commands::commissions::run(&ctx, &trades, from.as_deref(), to.as_deref(), format)?
        }
        Commands::Dividends {
            cash,
            from,
            to,
            format,
        } => {
            let ctx = CommandContext::load(&cli.config_paths, ConfigMode::Dividends)?;
            let cash = csv_input::load_cash_files(&cash)?;
            info!(rows = cash.len(), "dividends");
            commands::dividends::run(&ctx, &cash, from.as_deref(), to.as_deref(), format)?
        }
        Commands::Positions {
            trades,
            positions,
            from,
            to,
            format,
            parallel,
        } => {
            let ctx = CommandContext::load(&cli.config_paths, ConfigMode::Positions)?;
            let trades = csv_input::load_trade_files(&trades)?;
            let positions = csv_input::load_position_files(&positions)?;
            info!(trades = trades.len(), positions = positions.len(), "positions");
            commands::positions::run(
                &ctx,
                &trades,
                &positions,
                &commands::positions::PositionsArgs {
                    from: from.as_deref(),
                    to: to.as_deref(),
                    format,
                    parallel,
                },
            )?
        }
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tally_config::load_layered_yaml(&path_refs)?;
            format!("config_hash={}\n{}\n", loaded.config_hash, loaded.canonical_json)
        }
    };

    print!("{out}");
    Ok(())
}
