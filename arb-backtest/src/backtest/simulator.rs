//! Arbitrage detection and delta hedging over a quote series.
//!
//! Per timestamp, in input order:
//! 1. For each option, compare the market quote with the theoretical value
//!    and sell the full bid size or buy the full ask size on a trigger
//! 2. Add the traded volume to the running option position
//! 3. Weight the new position by the delta for its side (short positions
//!    use delta_short, flat or long positions use delta_long)
//! 4. Sum exposures over calls and puts
//! 5. Recompute the stock hedge from scratch from that aggregate
//!
//! Option positions carry forward between timestamps; the stock hedge does
//! not.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::{BacktestConfig, HedgeRounding};
use crate::data::{MarketData, OptionContract, Quote};
use crate::pricing::{TheoreticalValue, TheoreticalValues};

use super::positions::{PositionHistory, PositionRow};
use super::BacktestError;

/// Trade decision for one option at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSignal {
    /// Market bid is above model ask: sell into it.
    Sell,
    /// Market ask is below model bid: buy from it.
    Buy,
    Hold,
}

impl TradeSignal {
    /// The sell check runs first and wins if both sides trigger.
    pub fn evaluate(quote: &Quote, value: &TheoreticalValue, threshold: Decimal) -> Self {
        if quote.bid_price - value.expected_ask_price >= threshold {
            Self::Sell
        } else if value.expected_bid_price - quote.ask_price >= threshold {
            Self::Buy
        } else {
            Self::Hold
        }
    }

    /// Signed traded quantity for this signal.
    pub fn volume(&self, quote: &Quote) -> f64 {
        match self {
            Self::Sell => -quote.bid_volume,
            Self::Buy => quote.ask_volume,
            Self::Hold => 0.0,
        }
    }
}

/// Signed delta exposure of a position, using the delta for its side.
pub fn position_exposure(position: f64, value: &TheoreticalValue) -> f64 {
    let delta = if position < 0.0 {
        value.delta_short
    } else {
        value.delta_long
    };
    position.abs() * delta
}

/// Whole-share stock position offsetting the aggregate option delta.
pub fn hedge_position(total_delta: f64, rounding: HedgeRounding) -> i64 {
    -(rounding.apply(total_delta) as i64)
}

/// Sequential position simulator.
#[derive(Debug, Clone, Copy)]
pub struct ArbitrageSimulator {
    threshold: Decimal,
    rounding: HedgeRounding,
}

impl ArbitrageSimulator {
    pub fn new(threshold: Decimal, rounding: HedgeRounding) -> Self {
        Self {
            threshold,
            rounding,
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.arbitrage_threshold, config.hedge_rounding)
    }

    /// Run the simulation over every timestamp.
    ///
    /// The fold accumulator is the map of running option positions; each
    /// step produces one row of the history.
    pub fn run(
        &self,
        market: &MarketData,
        values: &TheoreticalValues,
    ) -> Result<PositionHistory, BacktestError> {
        info!("Running trading simulation over {} timestamps", market.len());

        let initial: BTreeMap<OptionContract, f64> = market
            .option_contracts()
            .into_iter()
            .map(|c| (c, 0.0))
            .collect();

        let (rows, _) = market.timestamps.iter().enumerate().try_fold(
            (Vec::with_capacity(market.len()), initial),
            |(mut rows, positions), (index, &timestamp)| {
                let (row, positions) = self.step(market, values, index, timestamp, positions)?;
                rows.push(row);
                Ok::<_, BacktestError>((rows, positions))
            },
        )?;

        let history = PositionHistory::new(rows);
        info!("Simulation complete: {} trades", history.total_trades());
        Ok(history)
    }

    fn step(
        &self,
        market: &MarketData,
        values: &TheoreticalValues,
        index: usize,
        timestamp: NaiveDateTime,
        mut positions: BTreeMap<OptionContract, f64>,
    ) -> Result<(PositionRow, BTreeMap<OptionContract, f64>), BacktestError> {
        let mut call_delta = 0.0;
        let mut put_delta = 0.0;
        let mut trade_count = 0;

        for (contract, position) in positions.iter_mut() {
            let quote = market
                .quote(contract, index)
                .ok_or_else(|| BacktestError::MissingQuote {
                    instrument: contract.to_string(),
                    index,
                })?;
            let value = values
                .get(contract, index)
                .ok_or_else(|| BacktestError::MissingTheoreticalValue {
                    option: contract.to_string(),
                    index,
                })?;
            check_finite(contract, index, quote, value)?;

            let signal = TradeSignal::evaluate(quote, value, self.threshold);
            let volume = signal.volume(quote);
            if volume != 0.0 {
                trade_count += 1;
                debug!(
                    "{} {:?} {} {} (bid {} / ask {}, model {} / {})",
                    timestamp,
                    signal,
                    volume.abs(),
                    contract,
                    quote.bid_price,
                    quote.ask_price,
                    value.expected_bid_price,
                    value.expected_ask_price
                );
            }

            *position += volume;
            let exposure = position_exposure(*position, value);
            if contract.is_call() {
                call_delta += exposure;
            } else {
                put_delta += exposure;
            }
        }

        let total_delta = call_delta + put_delta;
        let row = PositionRow {
            timestamp,
            options: positions.clone(),
            stock: hedge_position(total_delta, self.rounding),
            total_delta,
            trade_count,
        };
        Ok((row, positions))
    }
}

fn check_finite(
    contract: &OptionContract,
    index: usize,
    quote: &Quote,
    value: &TheoreticalValue,
) -> Result<(), BacktestError> {
    let fields = [
        ("BidVolume", quote.bid_volume),
        ("AskVolume", quote.ask_volume),
        ("DeltaShort", value.delta_short),
        ("DeltaLong", value.delta_long),
    ];
    match fields.iter().find(|(_, v)| !v.is_finite()) {
        Some(&(field, _)) => Err(BacktestError::NonFiniteInput {
            instrument: contract.to_string(),
            field,
            index,
        }),
        None => Ok(()),
    }
}
