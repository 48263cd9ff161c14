//! Option pricing.
//!
//! - Black-Scholes value and delta for European calls and puts
//! - Theoretical bid/ask values and hedge ratios for every quoted option

pub mod black_scholes;
pub mod theoretical;

use thiserror::Error;

pub use black_scholes::BlackScholes;
pub use theoretical::{TheoreticalValue, TheoreticalValueEngine, TheoreticalValues};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Invalid model parameter {name}: {value}")]
    InvalidModelParameter { name: &'static str, value: f64 },

    #[error("Non-finite {quantity}: {value}")]
    NonFiniteResult { quantity: &'static str, value: f64 },

    #[error("{series} has {found} rows, expected {expected}")]
    SeriesLengthMismatch {
        series: String,
        expected: usize,
        found: usize,
    },
}
