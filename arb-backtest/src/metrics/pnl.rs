//! Realized cashflow and mark-to-market valuation of a position history.
//!
//! - Trades are position changes between consecutive rows; the position
//!   before the first row is zero
//! - Buying pays the ask, selling receives the bid
//! - Open positions are marked long at the bid and short at the ask

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::PositionHistory;
use crate::data::{Instrument, MarketData};

use super::PnlError;

/// Cash and valuation after one timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    /// Cumulative realized cashflow.
    pub cash: Decimal,
    /// Mark-to-market value of the open positions.
    pub valuation: Decimal,
    pub equity: Decimal,
}

/// PnL of a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PnlReport {
    pub total_cashflow: Decimal,
    pub final_valuation: Decimal,
    pub total_pnl: Decimal,
    pub cashflow_by_instrument: BTreeMap<String, Decimal>,
    pub equity_curve: Vec<EquityPoint>,
    pub max_drawdown: Decimal,
}

impl PnlReport {
    pub fn summary(&self) -> String {
        format!(
            "Total Realized Cashflow: {:.2}\n\
             Final Portfolio Valuation: {:.2}\n\
             Total Strategy PnL: {:.2}\n\
             Max Drawdown: {:.2}",
            self.total_cashflow, self.final_valuation, self.total_pnl, self.max_drawdown
        )
    }
}

/// Cash received (positive) or paid (negative) for a signed trade.
pub fn trade_cashflow(trade: Decimal, bid: Decimal, ask: Decimal) -> Decimal {
    if trade >= Decimal::ZERO {
        -trade * ask
    } else {
        -trade * bid
    }
}

/// Liquidation value of a signed position.
pub fn mark_to_market(position: Decimal, bid: Decimal, ask: Decimal) -> Decimal {
    if position > Decimal::ZERO {
        position * bid
    } else if position < Decimal::ZERO {
        position * ask
    } else {
        Decimal::ZERO
    }
}

fn to_decimal(instrument: &Instrument, value: f64) -> Result<Decimal, PnlError> {
    Decimal::try_from(value).map_err(|_| PnlError::NonRepresentable {
        instrument: instrument.to_string(),
        value,
    })
}

/// PnL calculator.
pub struct PnlCalculator;

impl PnlCalculator {
    pub fn calculate(
        history: &PositionHistory,
        market: &MarketData,
    ) -> Result<PnlReport, PnlError> {
        let instruments = history.instruments();
        let mut previous: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut cashflow_by_instrument: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut equity_curve = Vec::with_capacity(history.len());
        let mut cash = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;

        for (index, row) in history.rows().iter().enumerate() {
            let mut valuation = Decimal::ZERO;

            for instrument in &instruments {
                let name = instrument.to_string();
                let (bid, ask) = market
                    .bid_ask(instrument, index)
                    .ok_or_else(|| PnlError::MissingQuote {
                        instrument: name.clone(),
                        index,
                    })?;

                let position = to_decimal(instrument, row.position(instrument))?;
                let before = previous.get(&name).copied().unwrap_or(Decimal::ZERO);
                let flow = trade_cashflow(position - before, bid, ask);

                cash += flow;
                *cashflow_by_instrument.entry(name.clone()).or_default() += flow;
                valuation += mark_to_market(position, bid, ask);
                previous.insert(name, position);
            }

            let equity = cash + valuation;
            if index == 0 || equity > peak {
                peak = equity;
            }
            max_drawdown = max_drawdown.max(peak - equity);

            equity_curve.push(EquityPoint {
                timestamp: row.timestamp,
                cash,
                valuation,
                equity,
            });
        }

        let final_valuation = equity_curve
            .last()
            .map(|p| p.valuation)
            .unwrap_or_default();
        let report = PnlReport {
            total_cashflow: cash,
            final_valuation,
            total_pnl: cash + final_valuation,
            cashflow_by_instrument,
            equity_curve,
            max_drawdown,
        };

        info!(
            "PnL: cashflow {:.2}, valuation {:.2}, total {:.2}",
            report.total_cashflow, report.final_valuation, report.total_pnl
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::PositionRow;
    use crate::data::{OptionContract, Quote, StockQuote};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn row(minute: u32, c70: f64, stock: i64) -> PositionRow {
        PositionRow {
            timestamp: ts(minute),
            options: BTreeMap::from([(OptionContract::call(70), c70)]),
            stock,
            total_delta: 0.0,
            trade_count: 0,
        }
    }

    fn market() -> MarketData {
        MarketData::new(
            vec![ts(0), ts(1), ts(2)],
            vec![0.1, 0.1, 0.1],
            vec![
                StockQuote::new(dec!(70.00), dec!(70.10)),
                StockQuote::new(dec!(70.50), dec!(70.60)),
                StockQuote::new(dec!(71.00), dec!(71.10)),
            ],
        )
        .with_option(
            OptionContract::call(70),
            vec![
                Quote::new(dec!(5.20), dec!(5.30), 10.0, 10.0),
                Quote::new(dec!(5.40), dec!(5.50), 10.0, 10.0),
                Quote::new(dec!(5.60), dec!(5.70), 10.0, 10.0),
            ],
        )
    }

    #[test]
    fn test_trade_cashflow_sides() {
        assert_eq!(trade_cashflow(dec!(10), dec!(5.20), dec!(5.30)), dec!(-53.0));
        assert_eq!(trade_cashflow(dec!(-10), dec!(5.20), dec!(5.30)), dec!(52.0));
        assert_eq!(trade_cashflow(dec!(0), dec!(5.20), dec!(5.30)), dec!(0));
    }

    #[test]
    fn test_mark_to_market_sides() {
        assert_eq!(mark_to_market(dec!(3), dec!(5.20), dec!(5.30)), dec!(15.60));
        assert_eq!(mark_to_market(dec!(-3), dec!(5.20), dec!(5.30)), dec!(-15.90));
        assert_eq!(mark_to_market(dec!(0), dec!(5.20), dec!(5.30)), dec!(0));
    }

    #[test]
    fn test_short_call_with_hedge() {
        // Sell 10 calls at t0 and buy 6 shares; add 2 shares at t1; hold.
        let history =
            PositionHistory::new(vec![row(0, -10.0, 6), row(1, -10.0, 8), row(2, -10.0, 8)]);
        let report = PnlCalculator::calculate(&history, &market()).unwrap();

        // Calls: +52.00. Stock: -6 * 70.10 - 2 * 70.60 = -561.80.
        assert_eq!(report.cashflow_by_instrument["C70"], dec!(52.00));
        assert_eq!(report.cashflow_by_instrument["Stock"], dec!(-561.80));
        assert_eq!(report.total_cashflow, dec!(-509.80));

        // Terminal marks: short calls at ask 5.70, long stock at bid 71.00.
        assert_eq!(report.final_valuation, dec!(-57.00) + dec!(568.00));
        assert_eq!(report.total_pnl, dec!(1.20));
        assert_eq!(report.equity_curve.len(), 3);
    }

    #[test]
    fn test_flat_history_has_zero_pnl() {
        let history = PositionHistory::new((0..3).map(|m| row(m, 0.0, 0)).collect());
        let report = PnlCalculator::calculate(&history, &market()).unwrap();
        assert_eq!(report.total_pnl, Decimal::ZERO);
        assert_eq!(report.max_drawdown, Decimal::ZERO);
    }

    #[test]
    fn test_missing_quote() {
        let history = PositionHistory::new((0..4).map(|m| row(m, 0.0, 0)).collect());
        assert!(matches!(
            PnlCalculator::calculate(&history, &market()),
            Err(PnlError::MissingQuote { index: 3, .. })
        ));
    }
}
