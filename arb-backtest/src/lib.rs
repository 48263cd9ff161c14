pub mod backtest;
pub mod config;
pub mod data;
pub mod metrics;
pub mod pricing;
pub mod validation;

// Re-export commonly used types
pub use backtest::{
    ArbitrageSimulator, BacktestEngine, BacktestError, BacktestResult, PositionHistory,
};
pub use config::{BacktestConfig, HedgeRounding};
pub use data::{
    DataError, DataLoader, Instrument, MarketData, OptionContract, OptionType, Quote, StockQuote,
};
pub use metrics::{PnlCalculator, PnlReport};
pub use pricing::{BlackScholes, PricingError, TheoreticalValueEngine, TheoreticalValues};
pub use validation::{DataIntegrityReport, DataIntegrityValidator};
