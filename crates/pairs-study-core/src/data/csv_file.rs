use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{check_request, require_rows, PriceSource};
use crate::error::PairsError;
use crate::types::{Money, PriceTable, Symbol};
use crate::PairsResult;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wide CSV of adjusted closes: a date column first, then one column per
/// symbol.
///
/// ```text
/// date,AAPL,MSFT
/// 2013-01-02,68.85,23.75
/// ```
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(&self, symbols: &[Symbol], start: NaiveDate, end: NaiveDate) -> PairsResult<PriceTable> {
        let file = File::open(&self.path).map_err(|e| {
            PairsError::DataSource(format!("Cannot open '{}': {e}", self.path.display()))
        })?;
        read_prices(file, symbols, start, end)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Parse a wide price CSV, keeping only `symbols` (in that order) and dates
/// in `[start, end)`. Rows with a blank cell in any kept column are dropped.
pub fn read_prices<R: Read>(
    reader: R,
    symbols: &[Symbol],
    start: NaiveDate,
    end: NaiveDate,
) -> PairsResult<PriceTable> {
    check_request(symbols, start, end)?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(PairsError::DataSource(
            "Price CSV needs a date column and at least one symbol column".into(),
        ));
    }

    let mut indices = Vec::with_capacity(symbols.len());
    for sym in symbols {
        let idx = headers
            .iter()
            .skip(1)
            .position(|h| h == sym)
            .ok_or_else(|| PairsError::UnknownSymbol(sym.clone()))?;
        indices.push(idx + 1);
    }

    let mut rows: Vec<(NaiveDate, Vec<Money>)> = Vec::new();
    let mut dropped = 0usize;
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| {
            PairsError::DateError(format!("Row {}: bad date '{raw_date}': {e}", line + 2))
        })?;

        let cells: Vec<&str> = indices
            .iter()
            .map(|&i| record.get(i).unwrap_or_default())
            .collect();
        if cells.iter().any(|c| c.is_empty()) {
            dropped += 1;
            continue;
        }

        let mut prices = Vec::with_capacity(cells.len());
        for (cell, sym) in cells.iter().zip(symbols) {
            let price = Decimal::from_str(cell).map_err(|e| PairsError::InvalidInput {
                field: sym.clone(),
                reason: format!("Row {}: bad price '{cell}': {e}", line + 2),
            })?;
            prices.push(price);
        }
        rows.push((date, prices));
    }

    if dropped > 0 {
        debug!(dropped, "dropped rows with missing prices");
    }
    rows.sort_by_key(|(d, _)| *d);

    let dates: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
    let columns = (0..symbols.len())
        .map(|k| rows.iter().map(|(_, p)| p[k]).collect())
        .collect();
    let file_rows = dates.len();
    let table = PriceTable::new(dates, symbols.to_vec(), columns)?;
    let table = require_rows(table.between(start, end)?, "csv")?;

    info!(
        rows = table.len(),
        file_rows,
        symbols = symbols.len(),
        "loaded prices from csv"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "\
date,AAA,BBB,CCC
2020-01-02,10.5,20.0,5
2020-01-03,10.6,,5.1
2020-01-06,10.7,20.4,5.2
2019-12-31,10.4,19.9,4.9
2020-02-03,11.0,21.0,5.5
";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn syms(list: &[&str]) -> Vec<Symbol> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reads_range_and_drops_blank_rows() {
        let table = read_prices(
            SAMPLE.as_bytes(),
            &syms(&["BBB", "AAA"]),
            d(2020, 1, 1),
            d(2020, 2, 3),
        )
        .unwrap();
        assert_eq!(table.dates(), &[d(2020, 1, 2), d(2020, 1, 6)]);
        assert_eq!(table.symbols(), &["BBB".to_string(), "AAA".to_string()]);
        assert_eq!(table.column("AAA").unwrap(), &[dec!(10.5), dec!(10.7)]);
    }

    #[test]
    fn test_blank_in_unrequested_column_is_kept() {
        let table = read_prices(
            SAMPLE.as_bytes(),
            &syms(&["AAA", "CCC"]),
            d(2020, 1, 1),
            d(2020, 1, 31),
        )
        .unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_end_date_is_exclusive() {
        let table = read_prices(
            SAMPLE.as_bytes(),
            &syms(&["AAA"]),
            d(2019, 12, 31),
            d(2020, 1, 6),
        )
        .unwrap();
        assert_eq!(table.dates(), &[d(2019, 12, 31), d(2020, 1, 2), d(2020, 1, 3)]);
    }

    #[test]
    fn test_unknown_symbol() {
        let result = read_prices(SAMPLE.as_bytes(), &syms(&["ZZZ"]), d(2020, 1, 1), d(2021, 1, 1));
        assert!(matches!(result, Err(PairsError::UnknownSymbol(s)) if s == "ZZZ"));
    }

    #[test]
    fn test_empty_range_is_an_error() {
        let result = read_prices(SAMPLE.as_bytes(), &syms(&["AAA"]), d(2021, 1, 1), d(2022, 1, 1));
        assert!(matches!(result, Err(PairsError::InsufficientData(_))));
    }

    #[test]
    fn test_bad_date_is_reported() {
        let csv = "date,AAA\n02/01/2020,10\n";
        let result = read_prices(csv.as_bytes(), &syms(&["AAA"]), d(2020, 1, 1), d(2021, 1, 1));
        assert!(matches!(result, Err(PairsError::DateError(_))));
    }
}
