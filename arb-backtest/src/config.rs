//! Run configuration.
//!
//! Loaded once from TOML and passed by value into the pricing model and the
//! simulator. Nothing reads configuration from global state.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::BlackScholes;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How the aggregate option delta is turned into a whole number of shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeRounding {
    /// Ceil positive exposure, floor negative exposure. The hedge always
    /// covers the full exposure and over-hedges by less than one share.
    #[default]
    AwayFromZero,
    /// Floor positive exposure, ceil negative exposure (truncation).
    TowardZero,
}

impl HedgeRounding {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Self::AwayFromZero => {
                if value >= 0.0 {
                    value.ceil()
                } else {
                    value.floor()
                }
            }
            Self::TowardZero => value.trunc(),
        }
    }
}

/// Configuration for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Annual risk-free rate.
    #[serde(default)]
    pub risk_free_rate: f64,

    /// Assumed annual volatility of the underlying.
    #[serde(default = "default_volatility")]
    pub volatility: f64,

    /// Minimum price discrepancy that triggers a trade.
    #[serde(default = "default_threshold")]
    pub arbitrage_threshold: Decimal,

    /// Rounding of the stock hedge.
    #[serde(default)]
    pub hedge_rounding: HedgeRounding,
}

fn default_volatility() -> f64 {
    0.20
}

fn default_threshold() -> Decimal {
    Decimal::new(10, 2)
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            volatility: default_volatility(),
            arbitrage_threshold: default_threshold(),
            hedge_rounding: HedgeRounding::default(),
        }
    }
}

impl BacktestConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn pricing_model(&self) -> BlackScholes {
        BlackScholes::new(self.risk_free_rate, self.volatility)
    }
}
