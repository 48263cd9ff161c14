//! Core data types for the arbitrage backtest.
//!
//! A dataset is one underlying stock plus a family of call/put contracts
//! sharing a single expiry horizon, quoted at the same ordered sequence of
//! timestamps.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DataError;

/// Column name used for the underlying stock.
pub const STOCK: &str = "Stock";

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Self::Call),
            'P' => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

/// An option contract identified by type and integer strike, e.g. `C70`.
///
/// Ordering follows the identifier text so that tables come out sorted by
/// name (`C100` sorts before `C70`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionContract {
    pub option_type: OptionType,
    pub strike: u32,
}

impl OptionContract {
    pub fn new(option_type: OptionType, strike: u32) -> Self {
        Self {
            option_type,
            strike,
        }
    }

    pub fn call(strike: u32) -> Self {
        Self::new(OptionType::Call, strike)
    }

    pub fn put(strike: u32) -> Self {
        Self::new(OptionType::Put, strike)
    }

    pub fn is_call(&self) -> bool {
        self.option_type == OptionType::Call
    }

    pub fn strike_f64(&self) -> f64 {
        f64::from(self.strike)
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.option_type.as_str(), self.strike)
    }
}

impl FromStr for OptionContract {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let option_type = chars
            .next()
            .and_then(OptionType::from_letter)
            .ok_or_else(|| DataError::UnknownInstrument(s.to_string()))?;
        let strike = chars
            .as_str()
            .parse::<u32>()
            .map_err(|_| DataError::UnknownInstrument(s.to_string()))?;
        Ok(Self::new(option_type, strike))
    }
}

/// Decimal digits of a strike, most significant first, without allocating.
fn strike_digits(strike: u32) -> ([u8; 10], usize) {
    let mut buf = [0u8; 10];
    let mut start = buf.len();
    let mut n = strike;
    loop {
        start -= 1;
        buf[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    (buf, start)
}

impl Ord for OptionContract {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, a_start) = strike_digits(self.strike);
        let (b, b_start) = strike_digits(other.strike);
        self.option_type
            .as_str()
            .cmp(other.option_type.as_str())
            .then_with(|| a[a_start..].cmp(&b[b_start..]))
    }
}

impl PartialOrd for OptionContract {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Either the underlying stock or one option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Stock,
    Option(OptionContract),
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => f.write_str(STOCK),
            Self::Option(contract) => contract.fmt(f),
        }
    }
}

impl FromStr for Instrument {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == STOCK {
            Ok(Self::Stock)
        } else {
            s.parse().map(Self::Option)
        }
    }
}

/// Quote field named in the input column headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuoteField {
    BidPrice,
    AskPrice,
    BidVolume,
    AskVolume,
}

impl QuoteField {
    pub const ALL: [QuoteField; 4] = [
        Self::BidPrice,
        Self::AskPrice,
        Self::BidVolume,
        Self::AskVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BidPrice => "BidPrice",
            Self::AskPrice => "AskPrice",
            Self::BidVolume => "BidVolume",
            Self::AskVolume => "AskVolume",
        }
    }
}

impl FromStr for QuoteField {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| DataError::MalformedInput(format!("unknown quote field '{}'", s)))
    }
}

/// Bid/ask quote for the underlying.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub bid_price: Decimal,
    pub ask_price: Decimal,
}

impl StockQuote {
    pub fn new(bid_price: Decimal, ask_price: Decimal) -> Self {
        Self {
            bid_price,
            ask_price,
        }
    }

    pub fn bid_f64(&self) -> f64 {
        self.bid_price.try_into().unwrap_or(f64::NAN)
    }

    pub fn ask_f64(&self) -> f64 {
        self.ask_price.try_into().unwrap_or(f64::NAN)
    }
}

/// Top-of-book quote for one option at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub bid_volume: f64,
    pub ask_volume: f64,
}

impl Quote {
    pub fn new(bid_price: Decimal, ask_price: Decimal, bid_volume: f64, ask_volume: f64) -> Self {
        Self {
            bid_price,
            ask_price,
            bid_volume,
            ask_volume,
        }
    }

    /// Bid above ask.
    pub fn is_crossed(&self) -> bool {
        self.bid_price > self.ask_price
    }
}

/// Complete quote table for one dataset.
///
/// Every series is indexed by position in `timestamps`. Option series are
/// kept in a `BTreeMap` so iteration order is the sorted identifier order.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub timestamps: Vec<NaiveDateTime>,
    pub time_to_expiry: Vec<f64>,
    pub stock: Vec<StockQuote>,
    pub options: BTreeMap<OptionContract, Vec<Quote>>,
}

impl MarketData {
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        time_to_expiry: Vec<f64>,
        stock: Vec<StockQuote>,
    ) -> Self {
        Self {
            timestamps,
            time_to_expiry,
            stock,
            options: BTreeMap::new(),
        }
    }

    /// Builder-style insertion of one option's quote series.
    pub fn with_option(mut self, contract: OptionContract, quotes: Vec<Quote>) -> Self {
        self.options.insert(contract, quotes);
        self
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn option_contracts(&self) -> Vec<OptionContract> {
        self.options.keys().copied().collect()
    }

    pub fn quote(&self, contract: &OptionContract, index: usize) -> Option<&Quote> {
        self.options.get(contract).and_then(|q| q.get(index))
    }

    /// Bid/ask of any instrument at a timestamp index.
    pub fn bid_ask(&self, instrument: &Instrument, index: usize) -> Option<(Decimal, Decimal)> {
        match instrument {
            Instrument::Stock => self
                .stock
                .get(index)
                .map(|q| (q.bid_price, q.ask_price)),
            Instrument::Option(contract) => self
                .quote(contract, index)
                .map(|q| (q.bid_price, q.ask_price)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_type_parsing() {
        assert_eq!(OptionType::from_letter('C'), Some(OptionType::Call));
        assert_eq!(OptionType::from_letter('p'), Some(OptionType::Put));
        assert_eq!(OptionType::from_letter('X'), None);
    }

    #[test]
    fn test_contract_parsing() {
        let c70: OptionContract = "C70".parse().unwrap();
        assert_eq!(c70, OptionContract::call(70));
        assert_eq!(c70.to_string(), "C70");

        let p85: OptionContract = "P85".parse().unwrap();
        assert_eq!(p85.option_type, OptionType::Put);
        assert_eq!(p85.strike, 85);

        assert!("X70".parse::<OptionContract>().is_err());
        assert!("C".parse::<OptionContract>().is_err());
        assert!("C7.5".parse::<OptionContract>().is_err());
    }

    #[test]
    fn test_instrument_parsing() {
        assert_eq!("Stock".parse::<Instrument>().unwrap(), Instrument::Stock);
        assert_eq!(
            "P60".parse::<Instrument>().unwrap(),
            Instrument::Option(OptionContract::put(60))
        );
        assert!(matches!(
            "Bond".parse::<Instrument>(),
            Err(DataError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_contract_ordering_by_name() {
        let mut contracts = vec![
            OptionContract::put(70),
            OptionContract::call(70),
            OptionContract::call(100),
        ];
        contracts.sort();
        let names: Vec<_> = contracts.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["C100", "C70", "P70"]);
    }

    #[test]
    fn test_contract_ordering_matches_name_order() {
        let strikes = [0, 5, 9, 10, 45, 50, 99, 100, 105, 1000, u32::MAX];
        let contracts: Vec<_> = strikes
            .iter()
            .flat_map(|&k| [OptionContract::call(k), OptionContract::put(k)])
            .collect();
        for a in &contracts {
            for b in &contracts {
                let by_name = a.to_string().cmp(&b.to_string());
                assert_eq!(a.cmp(b), by_name, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_quote_field_parsing() {
        assert_eq!("AskVolume".parse::<QuoteField>().unwrap(), QuoteField::AskVolume);
        assert!("MidPrice".parse::<QuoteField>().is_err());
    }
}
