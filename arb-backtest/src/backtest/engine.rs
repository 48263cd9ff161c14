//! End-to-end backtest run.
//!
//! 1. Load the quote table
//! 2. Validate it (fatal checks reject, advisories are logged)
//! 3. Compute theoretical values for every option
//! 4. Simulate trades and stock hedges
//! 5. Compute realized and mark-to-market PnL

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::config::BacktestConfig;
use crate::data::{DataLoader, MarketData};
use crate::metrics::{PnlCalculator, PnlReport};
use crate::pricing::TheoreticalValueEngine;
use crate::validation::DataIntegrityValidator;

use super::positions::PositionHistory;
use super::simulator::ArbitrageSimulator;
use super::BacktestError;

/// Complete result of a backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// Configuration used.
    pub config: BacktestConfig,

    /// First timestamp.
    pub start: Option<NaiveDateTime>,

    /// Last timestamp.
    pub end: Option<NaiveDateTime>,

    /// Number of timestamps simulated.
    pub timestamps: usize,

    /// Number of options traded against.
    pub option_count: usize,

    /// Trade events across all options.
    pub trade_count: usize,

    /// Position table.
    pub positions: PositionHistory,

    pub pnl: PnlReport,
}

impl BacktestResult {
    pub fn summary(&self) -> String {
        let period = match (self.start, self.end) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            _ => "empty".to_string(),
        };
        let final_stock = self.positions.last().map(|r| r.stock).unwrap_or(0);
        format!(
            "Backtest Results ({})\n\
             ----------------------------------------\n\
             Timestamps: {}\n\
             Options: {}\n\
             Trades: {}\n\
             Final Stock Position: {}\n\
             \n\
             {}",
            period,
            self.timestamps,
            self.option_count,
            self.trade_count,
            final_stock,
            self.pnl.summary()
        )
    }
}

/// Backtest engine.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Load a quote file and run the backtest on it.
    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<BacktestResult, BacktestError> {
        let market = DataLoader::new(path).load()?;
        self.run(&market)
    }

    /// Run the backtest on pre-loaded data.
    pub fn run(&self, market: &MarketData) -> Result<BacktestResult, BacktestError> {
        DataIntegrityValidator::new().validate(market).into_result()?;

        let engine = TheoreticalValueEngine::new(self.config.pricing_model());
        let values = engine.compute(market)?;

        let simulator = ArbitrageSimulator::from_config(&self.config);
        let positions = simulator.run(market, &values)?;

        let pnl = PnlCalculator::calculate(&positions, market)?;

        let result = BacktestResult {
            config: self.config.clone(),
            start: market.timestamps.first().copied(),
            end: market.timestamps.last().copied(),
            timestamps: market.len(),
            option_count: market.options.len(),
            trade_count: positions.total_trades(),
            positions,
            pnl,
        };
        info!(
            "Backtest complete: {} trades, PnL {:.2}",
            result.trade_count, result.pnl.total_pnl
        );
        Ok(result)
    }
}
