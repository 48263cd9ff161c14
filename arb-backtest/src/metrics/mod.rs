//! Strategy PnL.
//!
//! Realized cashflow from every position change plus the mark-to-market
//! value of what is still held at the end of the run.

pub mod pnl;

use thiserror::Error;

pub use pnl::{mark_to_market, trade_cashflow, EquityPoint, PnlCalculator, PnlReport};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PnlError {
    #[error("Position {value} in {instrument} cannot be represented as a decimal")]
    NonRepresentable { instrument: String, value: f64 },

    #[error("No quote for {instrument} at row {index}")]
    MissingQuote { instrument: String, index: usize },
}
