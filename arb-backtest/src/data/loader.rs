//! Data loader for wide quote tables.
//!
//! The input has one row per timestamp. The first column is the timestamp
//! index, one column holds the time to expiry, and every other column is a
//! `<Field>-<Instrument>` pair:
//! - BidPrice-Stock, AskPrice-Stock
//! - BidPrice-C70, AskPrice-C70, BidVolume-C70, AskVolume-C70
//! - TimeToExpiry
//!
//! CSV files are read with polars' CSV reader; `.parquet` files are scanned
//! lazily and collected.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use super::types::{Instrument, MarketData, OptionContract, Quote, QuoteField, StockQuote};
use super::DataError;

/// Header of the time-to-expiry column.
pub const TIME_TO_EXPIRY_COLUMN: &str = "TimeToExpiry";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// What a value column in the input table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    TimeToExpiry,
    Quote {
        field: QuoteField,
        instrument: Instrument,
    },
}

/// Parse a value column header such as `AskVolume-P75`.
pub fn parse_column_header(header: &str) -> Result<ColumnKind, DataError> {
    let header = header.trim();
    if header == TIME_TO_EXPIRY_COLUMN {
        return Ok(ColumnKind::TimeToExpiry);
    }

    let (field, instrument) = header.split_once('-').ok_or_else(|| {
        DataError::MalformedInput(format!("unrecognised column header '{}'", header))
    })?;

    Ok(ColumnKind::Quote {
        field: field.parse()?,
        instrument: instrument.parse()?,
    })
}

/// Parse a timestamp index value. Bare dates map to midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Loader for one quote file.
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn is_parquet(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
    }

    /// Read the raw file into a DataFrame without reshaping.
    pub fn load_dataframe(&self) -> Result<DataFrame, DataError> {
        if !self.path.exists() {
            return Err(DataError::FileNotFound(self.path.display().to_string()));
        }

        let df = if self.is_parquet() {
            LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?.collect()?
        } else {
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(10_000))
                .try_into_reader_with_file_path(Some(self.path.clone()))?
                .finish()?
        };

        Ok(df)
    }

    /// Load and reshape the file into a [`MarketData`] table.
    pub fn load(&self) -> Result<MarketData, DataError> {
        info!("Reading market data from {}", self.path.display());
        let df = self.load_dataframe()?;
        let market = frame_to_market_data(&df)?;
        info!(
            "Loaded {} timestamps, {} options",
            market.len(),
            market.options.len()
        );
        Ok(market)
    }
}

/// Reshape a wide DataFrame into per-instrument quote series.
pub fn frame_to_market_data(df: &DataFrame) -> Result<MarketData, DataError> {
    let (index_column, value_columns) = df
        .get_columns()
        .split_first()
        .ok_or_else(|| DataError::MalformedInput("input table has no columns".to_string()))?;

    let timestamps = timestamp_values(index_column)?;

    let mut time_to_expiry: Option<&Column> = None;
    let mut stock_columns: HashMap<QuoteField, &Column> = HashMap::new();
    let mut option_columns: BTreeMap<OptionContract, HashMap<QuoteField, &Column>> =
        BTreeMap::new();

    for column in value_columns {
        let header = column.name().as_str();
        let duplicate = match parse_column_header(header)? {
            ColumnKind::TimeToExpiry => time_to_expiry.replace(column).is_some(),
            ColumnKind::Quote {
                field,
                instrument: Instrument::Stock,
            } => stock_columns.insert(field, column).is_some(),
            ColumnKind::Quote {
                field,
                instrument: Instrument::Option(contract),
            } => option_columns
                .entry(contract)
                .or_default()
                .insert(field, column)
                .is_some(),
        };
        if duplicate {
            return Err(DataError::MalformedInput(format!(
                "duplicate column '{}'",
                header
            )));
        }
    }

    let time_to_expiry = time_to_expiry
        .ok_or_else(|| DataError::MalformedInput("missing TimeToExpiry column".to_string()))
        .and_then(float_values)?;

    let stock_bid = required(&stock_columns, Instrument::Stock, QuoteField::BidPrice)?;
    let stock_ask = required(&stock_columns, Instrument::Stock, QuoteField::AskPrice)?;
    let (stock_bid, stock_ask) = (decimal_values(stock_bid)?, decimal_values(stock_ask)?);
    let stock = stock_bid
        .into_iter()
        .zip(stock_ask)
        .map(|(bid, ask)| StockQuote::new(bid, ask))
        .collect();

    let mut market = MarketData::new(timestamps, time_to_expiry, stock);

    for (contract, columns) in &option_columns {
        let instrument = Instrument::Option(*contract);
        let bid_price = decimal_values(required(columns, instrument, QuoteField::BidPrice)?)?;
        let ask_price = decimal_values(required(columns, instrument, QuoteField::AskPrice)?)?;
        let bid_volume = float_values(required(columns, instrument, QuoteField::BidVolume)?)?;
        let ask_volume = float_values(required(columns, instrument, QuoteField::AskVolume)?)?;

        let quotes = bid_price
            .into_iter()
            .zip(ask_price)
            .zip(bid_volume.into_iter().zip(ask_volume))
            .map(|((bid, ask), (bid_vol, ask_vol))| Quote::new(bid, ask, bid_vol, ask_vol))
            .collect();
        market.options.insert(*contract, quotes);
    }

    Ok(market)
}

fn required<'a>(
    columns: &HashMap<QuoteField, &'a Column>,
    instrument: Instrument,
    field: QuoteField,
) -> Result<&'a Column, DataError> {
    columns
        .get(&field)
        .copied()
        .ok_or_else(|| DataError::MissingField {
            instrument: instrument.to_string(),
            field: field.as_str().to_string(),
        })
}

fn timestamp_values(column: &Column) -> Result<Vec<NaiveDateTime>, DataError> {
    let series = column.as_materialized_series().cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let text = value.ok_or_else(|| DataError::MissingValue {
                column: column.name().to_string(),
                row,
            })?;
            parse_timestamp(text).ok_or_else(|| DataError::InvalidTimestamp {
                row,
                value: text.to_string(),
            })
        })
        .collect()
}

fn float_values(column: &Column) -> Result<Vec<f64>, DataError> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| DataError::MissingValue {
                column: column.name().to_string(),
                row,
            })
        })
        .collect()
}

/// Prices go through their text form so `5.2` stays exactly 5.2.
fn decimal_values(column: &Column) -> Result<Vec<Decimal>, DataError> {
    let series = column.as_materialized_series().cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let text = value
                .ok_or_else(|| DataError::MissingValue {
                    column: column.name().to_string(),
                    row,
                })?
                .trim();
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map_err(|_| {
                    DataError::MalformedInput(format!(
                        "non-numeric price '{}' in column {} at row {}",
                        text,
                        column.name(),
                        row
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::OptionType;
    use rust_decimal_macros::dec;

    fn sample_frame() -> DataFrame {
        df!(
            "Timestamp" => ["2020-01-01 09:00:00", "2020-01-01 09:01:00"],
            "BidPrice-Stock" => [70.10, 70.20],
            "AskPrice-Stock" => [70.15, 70.25],
            "BidPrice-C70" => [5.20, 5.10],
            "AskPrice-C70" => [5.30, 5.20],
            "BidVolume-C70" => [10i64, 12],
            "AskVolume-C70" => [8i64, 9],
            "TimeToExpiry" => [0.05, 0.049]
        )
        .unwrap()
    }

    #[test]
    fn test_parse_column_header() {
        assert_eq!(
            parse_column_header("TimeToExpiry").unwrap(),
            ColumnKind::TimeToExpiry
        );
        assert_eq!(
            parse_column_header("BidPrice-Stock").unwrap(),
            ColumnKind::Quote {
                field: QuoteField::BidPrice,
                instrument: Instrument::Stock,
            }
        );
        assert_eq!(
            parse_column_header("AskVolume-P75").unwrap(),
            ColumnKind::Quote {
                field: QuoteField::AskVolume,
                instrument: Instrument::Option(OptionContract::new(OptionType::Put, 75)),
            }
        );
        assert!(parse_column_header("Garbage").is_err());
        assert!(matches!(
            parse_column_header("BidPrice-X75"),
            Err(DataError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2020-01-01 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2020-01-01T09:30:00"), Some(expected));
        assert!(parse_timestamp("2020-01-01").is_some());
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_frame_to_market_data() {
        let market = frame_to_market_data(&sample_frame()).unwrap();
        assert_eq!(market.len(), 2);
        assert_eq!(market.time_to_expiry, vec![0.05, 0.049]);
        assert_eq!(market.stock[0].bid_price, dec!(70.1));
        assert_eq!(market.stock[1].ask_price, dec!(70.25));

        let quote = market.quote(&OptionContract::call(70), 0).unwrap();
        assert_eq!(quote.bid_price, dec!(5.2));
        assert_eq!(quote.ask_price, dec!(5.3));
        assert_eq!(quote.bid_volume, 10.0);
        assert_eq!(quote.ask_volume, 8.0);
    }

    #[test]
    fn test_missing_option_field() {
        let mut df = sample_frame();
        df.drop_in_place("AskVolume-C70").unwrap();
        let err = frame_to_market_data(&df).unwrap_err();
        assert!(matches!(err, DataError::MissingField { .. }));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_missing_time_to_expiry() {
        let mut df = sample_frame();
        df.drop_in_place("TimeToExpiry").unwrap();
        assert!(matches!(
            frame_to_market_data(&df),
            Err(DataError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_load_csv_file() {
        let path = std::env::temp_dir()
            .join(format!("arb_backtest_loader_{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "Timestamp,BidPrice-Stock,AskPrice-Stock,\
             BidPrice-P70,AskPrice-P70,BidVolume-P70,AskVolume-P70,TimeToExpiry\n\
             2020-01-01 09:00:00,70.1,70.2,1.5,1.6,5,6,0.05\n\
             2020-01-01 09:01:00,70.0,70.1,1.55,1.65,5,6,0.049\n",
        )
        .unwrap();

        let market = DataLoader::new(&path).load().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(market.len(), 2);
        assert_eq!(market.option_contracts(), vec![OptionContract::put(70)]);
        assert_eq!(
            market.quote(&OptionContract::put(70), 1).unwrap().bid_price,
            dec!(1.55)
        );
    }

    #[test]
    fn test_missing_file() {
        let loader = DataLoader::new("does/not/exist.csv");
        assert!(matches!(loader.load(), Err(DataError::FileNotFound(_))));
    }
}
