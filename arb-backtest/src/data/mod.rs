//! Market data: instrument identifiers, quote tables, and the file loader.

pub mod loader;
pub mod types;

use polars::prelude::PolarsError;
use thiserror::Error;

pub use loader::{parse_column_header, ColumnKind, DataLoader};
pub use types::{
    Instrument, MarketData, OptionContract, OptionType, Quote, QuoteField, StockQuote, STOCK,
};

/// Errors raised while loading or validating market data.
///
/// Everything except `Polars` and `Io` is malformed input: the run aborts
/// before any pricing or simulation happens.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Missing field {field} for {instrument}")]
    MissingField { instrument: String, field: String },

    #[error("Missing value in column {column} at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Invalid timestamp at row {row}: {value}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub fn is_malformed_input(&self) -> bool {
        !matches!(self, Self::Polars(_) | Self::Io(_) | Self::FileNotFound(_))
    }
}
