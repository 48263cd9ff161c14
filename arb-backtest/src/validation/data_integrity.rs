//! Data integrity validation for a loaded quote table.
//!
//! Validates:
//! - Timestamp order (strictly increasing)
//! - Series lengths (one entry per timestamp in every series)
//! - Finite values (time to expiry and volumes)
//! - Non-negative prices and volumes
//! - Crossed quotes (bid above ask), advisory only

use rust_decimal::Decimal;
use tracing::warn;

use crate::data::{DataError, MarketData, Quote, STOCK};

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// A failed fatal check rejects the dataset.
    pub fatal: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            fatal: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            fatal: true,
            message: message.to_string(),
            details,
        }
    }

    pub fn advisory(mut self) -> Self {
        self.fatal = false;
        self
    }
}

/// Complete data integrity report for one dataset.
#[derive(Debug)]
pub struct DataIntegrityReport {
    pub rows: usize,
    pub options: usize,
    pub checks: Vec<CheckResult>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn fatal_failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed && c.fatal).collect()
    }

    pub fn advisories(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed && !c.fatal).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        let mut out = format!(
            "{} rows, {} options: {}/{} checks passed",
            self.rows, self.options, passed, total
        );
        for check in self.checks.iter().filter(|c| !c.passed) {
            let level = if check.fatal { "FAIL" } else { "WARN" };
            out.push_str(&format!("\n  [{}] {}: {}", level, check.name, check.message));
            if let Some(details) = &check.details {
                out.push_str(&format!(" ({})", details));
            }
        }
        out
    }

    /// Reject the dataset if any fatal check failed.
    pub fn into_result(self) -> Result<Self, DataError> {
        let failures: Vec<String> = self
            .fatal_failures()
            .iter()
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(DataError::MalformedInput(failures.join("; ")))
        }
    }
}

/// Validator for a loaded quote table.
#[derive(Debug)]
pub struct DataIntegrityValidator {
    max_details: usize,
}

impl Default for DataIntegrityValidator {
    fn default() -> Self {
        Self { max_details: 5 }
    }
}

impl DataIntegrityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all validation checks.
    pub fn validate(&self, market: &MarketData) -> DataIntegrityReport {
        let checks = vec![
            self.check_timestamp_order(market),
            self.check_series_lengths(market),
            self.check_finite_values(market),
            self.check_non_negative_quotes(market),
            self.check_crossed_quotes(market),
        ];

        for check in checks.iter().filter(|c| !c.passed && !c.fatal) {
            warn!("{}: {}", check.name, check.message);
        }

        DataIntegrityReport {
            rows: market.len(),
            options: market.options.len(),
            checks,
        }
    }

    fn details(&self, issues: &[String]) -> Option<String> {
        if issues.is_empty() {
            return None;
        }
        let shown: Vec<_> = issues.iter().take(self.max_details).cloned().collect();
        let more = issues.len().saturating_sub(shown.len());
        if more > 0 {
            Some(format!("{}; and {} more", shown.join("; "), more))
        } else {
            Some(shown.join("; "))
        }
    }

    /// Check that timestamps are strictly increasing.
    fn check_timestamp_order(&self, market: &MarketData) -> CheckResult {
        let issues: Vec<String> = market
            .timestamps
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[1] <= w[0])
            .map(|(i, w)| format!("row {}: {} after {}", i + 1, w[1], w[0]))
            .collect();

        if issues.is_empty() {
            CheckResult::pass(
                "timestamp_order",
                &format!("{} timestamps strictly increasing", market.len()),
            )
        } else {
            CheckResult::fail(
                "timestamp_order",
                &format!("{} out-of-order or duplicate timestamps", issues.len()),
                self.details(&issues),
            )
        }
    }

    /// Check that every series has one entry per timestamp.
    fn check_series_lengths(&self, market: &MarketData) -> CheckResult {
        let rows = market.len();
        let mut issues = Vec::new();

        if market.time_to_expiry.len() != rows {
            issues.push(format!("TimeToExpiry has {}", market.time_to_expiry.len()));
        }
        if market.stock.len() != rows {
            issues.push(format!("{} has {}", STOCK, market.stock.len()));
        }
        for (contract, quotes) in &market.options {
            if quotes.len() != rows {
                issues.push(format!("{} has {}", contract, quotes.len()));
            }
        }

        if issues.is_empty() {
            CheckResult::pass("series_lengths", "All series aligned with timestamps")
        } else {
            CheckResult::fail(
                "series_lengths",
                &format!("{} series not of length {}", issues.len(), rows),
                self.details(&issues),
            )
        }
    }

    /// Check time to expiry and volumes are finite.
    fn check_finite_values(&self, market: &MarketData) -> CheckResult {
        let mut issues: Vec<String> = market
            .time_to_expiry
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_finite())
            .map(|(i, t)| format!("TimeToExpiry row {}: {}", i, t))
            .collect();

        for (contract, quotes) in &market.options {
            for (i, q) in quotes.iter().enumerate() {
                if !q.bid_volume.is_finite() || !q.ask_volume.is_finite() {
                    issues.push(format!(
                        "{} row {}: volumes {}/{}",
                        contract, i, q.bid_volume, q.ask_volume
                    ));
                }
            }
        }

        if issues.is_empty() {
            CheckResult::pass("finite_values", "All numeric values finite")
        } else {
            CheckResult::fail(
                "finite_values",
                &format!("{} non-finite values", issues.len()),
                self.details(&issues),
            )
        }
    }

    /// Check prices and volumes are >= 0.
    fn check_non_negative_quotes(&self, market: &MarketData) -> CheckResult {
        let mut issues: Vec<String> = market
            .stock
            .iter()
            .enumerate()
            .filter(|(_, q)| q.bid_price < Decimal::ZERO || q.ask_price < Decimal::ZERO)
            .map(|(i, q)| format!("{} row {}: {}/{}", STOCK, i, q.bid_price, q.ask_price))
            .collect();

        for (contract, quotes) in &market.options {
            for (i, q) in quotes.iter().enumerate() {
                if has_negative(q) {
                    issues.push(format!(
                        "{} row {}: {}/{} vol {}/{}",
                        contract, i, q.bid_price, q.ask_price, q.bid_volume, q.ask_volume
                    ));
                }
            }
        }

        if issues.is_empty() {
            CheckResult::pass("non_negative_quotes", "All prices and volumes non-negative")
        } else {
            CheckResult::fail(
                "non_negative_quotes",
                &format!("{} rows with negative prices or volumes", issues.len()),
                self.details(&issues),
            )
        }
    }

    /// Check bid <= ask. Crossed markets are reported, not rejected.
    fn check_crossed_quotes(&self, market: &MarketData) -> CheckResult {
        let mut issues: Vec<String> = market
            .stock
            .iter()
            .enumerate()
            .filter(|(_, q)| q.bid_price > q.ask_price)
            .map(|(i, q)| format!("{} row {}: {} > {}", STOCK, i, q.bid_price, q.ask_price))
            .collect();

        for (contract, quotes) in &market.options {
            for (i, q) in quotes.iter().enumerate().filter(|(_, q)| q.is_crossed()) {
                issues.push(format!(
                    "{} row {}: {} > {}",
                    contract, i, q.bid_price, q.ask_price
                ));
            }
        }

        if issues.is_empty() {
            CheckResult::pass("crossed_quotes", "No crossed quotes")
        } else {
            CheckResult::fail(
                "crossed_quotes",
                &format!("{} crossed quotes", issues.len()),
                self.details(&issues),
            )
            .advisory()
        }
    }
}

fn has_negative(q: &Quote) -> bool {
    q.bid_price < Decimal::ZERO
        || q.ask_price < Decimal::ZERO
        || q.bid_volume < 0.0
        || q.ask_volume < 0.0
}
