//! Backtest of the delta-neutral arbitrage strategy.
//!
//! This module provides:
//! - Trade detection against theoretical values
//! - Position tracking per option and the integer stock hedge
//! - The end-to-end engine (validate, price, simulate, PnL)

pub mod engine;
pub mod positions;
pub mod simulator;

use thiserror::Error;

use crate::data::DataError;
use crate::metrics::PnlError;
use crate::pricing::PricingError;

pub use engine::{BacktestEngine, BacktestResult};
pub use positions::{PositionHistory, PositionRow};
pub use simulator::{hedge_position, position_exposure, ArbitrageSimulator, TradeSignal};

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("PnL error: {0}")]
    Pnl(#[from] PnlError),

    #[error("No quote for {instrument} at row {index}")]
    MissingQuote { instrument: String, index: usize },

    #[error("No theoretical value for {option} at row {index}")]
    MissingTheoreticalValue { option: String, index: usize },

    #[error("Non-finite {field} for {instrument} at row {index}")]
    NonFiniteInput {
        instrument: String,
        field: &'static str,
        index: usize,
    },
}
