//! Position history produced by the simulator.
//!
//! One row per input timestamp, in input order. Option positions are signed
//! real quantities; the stock hedge is a whole number of shares.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;

use crate::data::{DataError, Instrument, OptionContract, STOCK};

/// Positions held at the end of one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRow {
    pub timestamp: NaiveDateTime,
    #[serde(serialize_with = "serialize_positions")]
    pub options: BTreeMap<OptionContract, f64>,
    pub stock: i64,
    /// Aggregate option delta the stock position hedges.
    pub total_delta: f64,
    /// Options that traded at this timestamp.
    pub trade_count: usize,
}

fn serialize_positions<S>(
    positions: &BTreeMap<OptionContract, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_map(positions.iter().map(|(c, p)| (c.to_string(), p)))
}

impl PositionRow {
    pub fn option(&self, contract: &OptionContract) -> f64 {
        self.options.get(contract).copied().unwrap_or(0.0)
    }

    /// Position in any instrument; the stock position as a real number.
    pub fn position(&self, instrument: &Instrument) -> f64 {
        match instrument {
            Instrument::Stock => self.stock as f64,
            Instrument::Option(contract) => self.option(contract),
        }
    }
}

/// Full position history for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PositionHistory {
    rows: Vec<PositionRow>,
}

impl PositionHistory {
    pub fn new(rows: Vec<PositionRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[PositionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&PositionRow> {
        self.rows.last()
    }

    pub fn total_trades(&self) -> usize {
        self.rows.iter().map(|r| r.trade_count).sum()
    }

    /// Instruments in column order: options sorted by name, then the stock.
    pub fn instruments(&self) -> Vec<Instrument> {
        let mut instruments: Vec<_> = self
            .rows
            .first()
            .map(|r| r.options.keys().map(|c| Instrument::Option(*c)).collect())
            .unwrap_or_default();
        instruments.push(Instrument::Stock);
        instruments
    }

    pub fn option_series(&self, contract: &OptionContract) -> Vec<f64> {
        self.rows.iter().map(|r| r.option(contract)).collect()
    }

    pub fn stock_series(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.stock).collect()
    }

    /// Convert to a DataFrame: `Timestamp`, one column per option, `Stock`.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let timestamps: Vec<String> = self
            .rows
            .iter()
            .map(|r| r.timestamp.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            .collect();

        let mut columns = vec![Column::new("Timestamp".into(), timestamps)];
        for instrument in self.instruments() {
            let column = match instrument {
                Instrument::Stock => Column::new(STOCK.into(), self.stock_series()),
                Instrument::Option(contract) => Column::new(
                    contract.to_string().as_str().into(),
                    self.option_series(&contract),
                ),
            };
            columns.push(column);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Write the position table as CSV.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn history() -> PositionHistory {
        let ts = |m| {
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(9, m, 0)
                .unwrap()
        };
        let row = |m, c70, p70, stock| PositionRow {
            timestamp: ts(m),
            options: BTreeMap::from([
                (OptionContract::put(70), p70),
                (OptionContract::call(70), c70),
            ]),
            stock,
            total_delta: 0.0,
            trade_count: 1,
        };
        PositionHistory::new(vec![row(0, -10.0, 0.0, 6), row(1, -10.0, 5.0, 9)])
    }

    #[test]
    fn test_instrument_order() {
        let names: Vec<_> = history()
            .instruments()
            .iter()
            .map(|i| i.to_string())
            .collect();
        assert_eq!(names, vec!["C70", "P70", "Stock"]);
    }

    #[test]
    fn test_series_accessors() {
        let history = history();
        assert_eq!(history.option_series(&OptionContract::put(70)), vec![0.0, 5.0]);
        assert_eq!(history.stock_series(), vec![6, 9]);
        assert_eq!(history.total_trades(), 2);
        assert_eq!(history.last().unwrap().position(&Instrument::Stock), 9.0);
    }

    #[test]
    fn test_to_dataframe() {
        let df = history().to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["Timestamp", "C70", "P70", "Stock"]);
    }
}
