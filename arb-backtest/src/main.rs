//! Options arbitrage backtester CLI.
//!
//! Usage:
//! ```bash
//! # Run a backtest over a quote file
//! arb-backtest run --data data/quotes.csv --config config/default.toml
//!
//! # Check a quote file without running
//! arb-backtest validate --data data/quotes.csv
//!
//! # Price a single option
//! arb-backtest price --spot 70 --strike 70 --tte 0.1
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use arb_backtest::{BacktestConfig, BacktestEngine, DataIntegrityValidator, DataLoader};

#[derive(Parser)]
#[command(name = "arb-backtest")]
#[command(about = "Delta-neutral options arbitrage backtester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over a quote file
    Run {
        /// Path to the quote file (CSV or parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the position table as CSV
        #[arg(long)]
        positions_out: Option<PathBuf>,

        /// Write the full result as JSON
        #[arg(long)]
        report_out: Option<PathBuf>,
    },

    /// Run the data integrity checks on a quote file
    Validate {
        /// Path to the quote file (CSV or parquet)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Price a call and a put with the configured model
    Price {
        #[arg(long)]
        spot: f64,

        #[arg(long)]
        strike: f64,

        /// Time to expiry in years
        #[arg(long)]
        tte: f64,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<BacktestConfig> {
    match path {
        Some(path) => BacktestConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(BacktestConfig::default()),
    }
}

fn cmd_run(
    data: PathBuf,
    config: Option<PathBuf>,
    positions_out: Option<PathBuf>,
    report_out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    info!(
        "Threshold {}, volatility {}, rate {}",
        config.arbitrage_threshold, config.volatility, config.risk_free_rate
    );

    let result = BacktestEngine::new(config)
        .run_file(&data)
        .with_context(|| format!("Backtest failed for {}", data.display()))?;

    println!("{}", result.summary());

    if let Some(path) = positions_out {
        result
            .positions
            .write_csv(&path)
            .with_context(|| format!("Failed to write positions to {}", path.display()))?;
        info!("Positions written to {}", path.display());
    }

    if let Some(path) = report_out {
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_validate(data: PathBuf) -> Result<()> {
    let market = DataLoader::new(&data)
        .load()
        .with_context(|| format!("Failed to load {}", data.display()))?;
    let report = DataIntegrityValidator::new().validate(&market);
    println!("{}", report.summary());

    report.into_result()?;
    Ok(())
}

fn cmd_price(spot: f64, strike: f64, tte: f64, config: Option<PathBuf>) -> Result<()> {
    let model = load_config(config)?.pricing_model();

    println!(
        "Call: {:.4} (delta {:.4})",
        model.call_value(spot, strike, tte)?,
        model.call_delta(spot, strike, tte)?
    );
    println!(
        "Put:  {:.4} (delta {:.4})",
        model.put_value(spot, strike, tte)?,
        model.put_delta(spot, strike, tte)?
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arb_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            positions_out,
            report_out,
        } => cmd_run(data, config, positions_out, report_out)?,
        Commands::Validate { data } => cmd_validate(data)?,
        Commands::Price {
            spot,
            strike,
            tte,
            config,
        } => cmd_price(spot, strike, tte, config)?,
    }

    Ok(())
}
