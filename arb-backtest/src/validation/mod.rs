//! Validation of loaded market data.
//!
//! Structural problems (ordering, lengths, non-finite or negative values)
//! reject the dataset; crossed quotes are only reported.

pub mod data_integrity;

pub use data_integrity::{CheckResult, DataIntegrityReport, DataIntegrityValidator};
