//! Theoretical bid/ask values and hedge ratios per option per timestamp.
//!
//! Each side of a trade is priced off the stock quote that is least
//! favourable to the counterparty:
//!
//! | type | expected ask      | delta short        | expected bid      | delta long        |
//! |------|-------------------|--------------------|-------------------|-------------------|
//! | call | call(stock ask)   | -call_delta(ask)   | call(stock bid)   | call_delta(bid)   |
//! | put  | put(stock bid)    | -put_delta(bid)    | put(stock ask)    | put_delta(ask)    |
//!
//! Expected prices are rounded to cents; deltas are kept unrounded.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::data::{MarketData, OptionContract, OptionType, StockQuote};

use super::{BlackScholes, PricingError};

/// Model-derived prices and hedge ratios for one option at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TheoreticalValue {
    pub expected_ask_price: Decimal,
    pub expected_bid_price: Decimal,
    /// Hedge ratio applied while the position is short.
    pub delta_short: f64,
    /// Hedge ratio applied while the position is flat or long.
    pub delta_long: f64,
}

/// Theoretical values for every option, one entry per timestamp.
#[derive(Debug, Clone, Default)]
pub struct TheoreticalValues {
    values: BTreeMap<OptionContract, Vec<TheoreticalValue>>,
}

impl TheoreticalValues {
    pub fn get(&self, contract: &OptionContract, index: usize) -> Option<&TheoreticalValue> {
        self.values.get(contract).and_then(|v| v.get(index))
    }

    pub fn series(&self, contract: &OptionContract) -> Option<&[TheoreticalValue]> {
        self.values.get(contract).map(Vec::as_slice)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &OptionContract> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(OptionContract, Vec<TheoreticalValue>)> for TheoreticalValues {
    fn from_iter<I: IntoIterator<Item = (OptionContract, Vec<TheoreticalValue>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Round half-to-even on the binary value scaled to cents, so a price
/// stored just below a half cent rounds down.
fn round_cents(quantity: &'static str, value: f64) -> Result<Decimal, PricingError> {
    Decimal::try_from((value * 100.0).round_ties_even() / 100.0)
        .map(|d| d.round_dp(2))
        .map_err(|_| PricingError::NonFiniteResult { quantity, value })
}

/// Applies the pricing model across a whole quote table.
#[derive(Debug, Clone, Copy)]
pub struct TheoreticalValueEngine {
    model: BlackScholes,
}

impl TheoreticalValueEngine {
    pub fn new(model: BlackScholes) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &BlackScholes {
        &self.model
    }

    /// Theoretical value of one option against one stock quote.
    pub fn value(
        &self,
        contract: &OptionContract,
        stock: &StockQuote,
        time_to_expiry: f64,
    ) -> Result<TheoreticalValue, PricingError> {
        let strike = contract.strike_f64();
        let (stock_bid, stock_ask) = (stock.bid_f64(), stock.ask_f64());
        let bs = &self.model;

        let (ask_value, delta_short, bid_value, delta_long) = match contract.option_type {
            OptionType::Call => (
                bs.call_value(stock_ask, strike, time_to_expiry)?,
                -bs.call_delta(stock_ask, strike, time_to_expiry)?,
                bs.call_value(stock_bid, strike, time_to_expiry)?,
                bs.call_delta(stock_bid, strike, time_to_expiry)?,
            ),
            OptionType::Put => (
                bs.put_value(stock_bid, strike, time_to_expiry)?,
                -bs.put_delta(stock_bid, strike, time_to_expiry)?,
                bs.put_value(stock_ask, strike, time_to_expiry)?,
                bs.put_delta(stock_ask, strike, time_to_expiry)?,
            ),
        };

        Ok(TheoreticalValue {
            expected_ask_price: round_cents("expected_ask_price", ask_value)?,
            expected_bid_price: round_cents("expected_bid_price", bid_value)?,
            delta_short,
            delta_long,
        })
    }

    /// Price every option at every timestamp.
    ///
    /// Options are priced in parallel; the result is keyed by contract so
    /// its order does not depend on scheduling.
    pub fn compute(&self, market: &MarketData) -> Result<TheoreticalValues, PricingError> {
        let rows = market.len();
        for (series, found) in [
            ("TimeToExpiry", market.time_to_expiry.len()),
            ("Stock", market.stock.len()),
        ] {
            if found != rows {
                return Err(PricingError::SeriesLengthMismatch {
                    series: series.to_string(),
                    expected: rows,
                    found,
                });
            }
        }

        let contracts = market.option_contracts();
        info!(
            "Calculating theoretical values for {} options over {} timestamps",
            contracts.len(),
            rows
        );

        let values = contracts
            .par_iter()
            .map(|contract| {
                let series = market
                    .stock
                    .iter()
                    .zip(&market.time_to_expiry)
                    .map(|(stock, &tte)| self.value(contract, stock, tte))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((*contract, series))
            })
            .collect::<Result<BTreeMap<_, _>, PricingError>>()?;

        Ok(TheoreticalValues { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn engine() -> TheoreticalValueEngine {
        TheoreticalValueEngine::new(BlackScholes::new(0.0, 0.20))
    }

    fn market() -> MarketData {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let timestamps = (0..3)
            .map(|i| start + chrono::Duration::minutes(i))
            .collect();
        let stock = vec![
            StockQuote::new(dec!(70.00), dec!(70.20)),
            StockQuote::new(dec!(69.50), dec!(69.70)),
            StockQuote::new(dec!(71.00), dec!(71.10)),
        ];
        let quote = crate::data::Quote::new(dec!(1.0), dec!(1.1), 5.0, 5.0);
        MarketData::new(timestamps, vec![0.1, 0.05, 0.0], stock)
            .with_option(OptionContract::call(70), vec![quote; 3])
            .with_option(OptionContract::put(70), vec![quote; 3])
    }

    #[test]
    fn test_call_uses_ask_for_ask_side() {
        let engine = engine();
        let bs = engine.model();
        let stock = StockQuote::new(dec!(70.00), dec!(70.20));
        let value = engine.value(&OptionContract::call(70), &stock, 0.1).unwrap();

        let ask = bs.call_value(70.20, 70.0, 0.1).unwrap();
        let bid = bs.call_value(70.00, 70.0, 0.1).unwrap();
        assert_eq!(value.expected_ask_price, round_cents("ask", ask).unwrap());
        assert_eq!(value.expected_bid_price, round_cents("bid", bid).unwrap());
        assert_eq!(value.delta_short, -bs.call_delta(70.20, 70.0, 0.1).unwrap());
        assert_eq!(value.delta_long, bs.call_delta(70.00, 70.0, 0.1).unwrap());
        assert!(value.delta_short < 0.0 && value.delta_long > 0.0);
    }

    #[test]
    fn test_put_uses_bid_for_ask_side() {
        let engine = engine();
        let bs = engine.model();
        let stock = StockQuote::new(dec!(70.00), dec!(70.20));
        let value = engine.value(&OptionContract::put(70), &stock, 0.1).unwrap();

        let ask = bs.put_value(70.00, 70.0, 0.1).unwrap();
        let bid = bs.put_value(70.20, 70.0, 0.1).unwrap();
        assert_eq!(value.expected_ask_price, round_cents("ask", ask).unwrap());
        assert_eq!(value.expected_bid_price, round_cents("bid", bid).unwrap());
        assert_eq!(value.delta_short, -bs.put_delta(70.00, 70.0, 0.1).unwrap());
        assert_eq!(value.delta_long, bs.put_delta(70.20, 70.0, 0.1).unwrap());
        // Short put hedges like long stock, long put like short stock.
        assert!(value.delta_short > 0.0 && value.delta_long < 0.0);
    }

    #[test]
    fn test_round_cents_uses_binary_value() {
        // 2.675 and 5.015 are stored just below the half cent.
        assert_eq!(round_cents("price", 2.675).unwrap(), dec!(2.67));
        assert_eq!(round_cents("price", 5.015).unwrap(), dec!(5.01));
        // Exact half cents go to the even cent.
        assert_eq!(round_cents("price", 0.125).unwrap(), dec!(0.12));
        assert_eq!(round_cents("price", 0.375).unwrap(), dec!(0.38));
        assert_eq!(round_cents("price", 1.1).unwrap(), dec!(1.10));
        assert!(round_cents("price", 1.0999999999999943).unwrap().scale() <= 2);
        assert!(matches!(
            round_cents("price", f64::NAN),
            Err(PricingError::NonFiniteResult { quantity: "price", .. })
        ));
    }

    #[test]
    fn test_prices_rounded_to_cents() {
        let values = engine().compute(&market()).unwrap();
        for contract in values.contracts() {
            for value in values.series(contract).unwrap() {
                assert!(value.expected_ask_price.scale() <= 2);
                assert!(value.expected_bid_price.scale() <= 2);
            }
        }
    }

    #[test]
    fn test_compute_covers_every_row() {
        let market = market();
        let values = engine().compute(&market).unwrap();
        assert_eq!(values.len(), 2);
        for contract in market.option_contracts() {
            assert_eq!(values.series(&contract).unwrap().len(), market.len());
        }
        // Final row is at expiry: intrinsic value off the stock quotes.
        let call_at_expiry = values.get(&OptionContract::call(70), 2).unwrap();
        assert_eq!(call_at_expiry.expected_ask_price, dec!(1.10));
        assert_eq!(call_at_expiry.expected_bid_price, dec!(1.00));
        assert_eq!(call_at_expiry.delta_long, 1.0);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let market = market();
        let first = engine().compute(&market).unwrap();
        let second = engine().compute(&market).unwrap();
        for contract in market.option_contracts() {
            let a = first.series(&contract).unwrap();
            let b = second.series(&contract).unwrap();
            for (x, y) in a.iter().zip(b) {
                assert_eq!(x.expected_ask_price, y.expected_ask_price);
                assert_eq!(x.expected_bid_price, y.expected_bid_price);
                assert_eq!(x.delta_short.to_bits(), y.delta_short.to_bits());
                assert_eq!(x.delta_long.to_bits(), y.delta_long.to_bits());
            }
        }
    }

    #[test]
    fn test_negative_time_to_expiry_rejected() {
        let mut market = market();
        market.time_to_expiry[1] = -0.01;
        assert!(matches!(
            engine().compute(&market),
            Err(PricingError::InvalidModelParameter { name: "time_to_expiry", .. })
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut market = market();
        market.stock.pop();
        assert!(matches!(
            engine().compute(&market),
            Err(PricingError::SeriesLengthMismatch { .. })
        ));
    }
}
