use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PairsError;
use crate::PairsResult;

/// Adjusted closing prices. Wraps Decimal so raw quotes are stored exactly.
pub type Money = Decimal;

/// Ticker symbol, e.g. "AAPL".
pub type Symbol = String;

/// Two symbols in scan order: `first` is the regressor, `second` the regressand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPair {
    pub first: Symbol,
    pub second: Symbol,
}

impl SymbolPair {
    pub fn new(first: impl Into<Symbol>, second: impl Into<Symbol>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

impl FromStr for SymbolPair {
    type Err = PairsError;

    /// Parses "AAPL,MSFT" or "AAPL/MSFT".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .split(|c| c == ',' || c == '/')
            .map(str::trim)
            .collect();
        match parts.as_slice() {
            [a, b] if !a.is_empty() && !b.is_empty() && a != b => Ok(SymbolPair::new(*a, *b)),
            _ => Err(PairsError::InvalidInput {
                field: "pair".into(),
                reason: format!("Expected two distinct symbols like 'AAPL,MSFT', got '{s}'"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Price table
// ---------------------------------------------------------------------------

/// Daily adjusted closes: ascending dates × symbols.
///
/// Every column shares the same date index. Cells are strictly positive.
/// An `f64` copy of each column is kept alongside the exact prices because
/// every statistical stage works in floating point.
#[derive(Debug, Clone, Serialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<Symbol>,
    columns: Vec<Vec<Money>>,
    #[serde(skip)]
    values: Vec<Vec<f64>>,
}

impl PriceTable {
    /// Build a table from column-major data. Dates must be strictly ascending.
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<Symbol>,
        columns: Vec<Vec<Money>>,
    ) -> PairsResult<Self> {
        if symbols.len() != columns.len() {
            return Err(PairsError::InvalidInput {
                field: "columns".into(),
                reason: format!(
                    "{} symbols but {} price columns",
                    symbols.len(),
                    columns.len()
                ),
            });
        }
        for (i, sym) in symbols.iter().enumerate() {
            if symbols[..i].contains(sym) {
                return Err(PairsError::InvalidInput {
                    field: "symbols".into(),
                    reason: format!("Duplicate symbol '{sym}'"),
                });
            }
        }
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PairsError::DateError(format!(
                "Dates must be strictly ascending ({} is followed by {})",
                w[0], w[1]
            )));
        }

        let mut values = Vec::with_capacity(columns.len());
        for (sym, col) in symbols.iter().zip(&columns) {
            if col.len() != dates.len() {
                return Err(PairsError::InvalidInput {
                    field: sym.clone(),
                    reason: format!(
                        "Column has {} prices but the index has {} dates",
                        col.len(),
                        dates.len()
                    ),
                });
            }
            let mut floats = Vec::with_capacity(col.len());
            for (date, price) in dates.iter().zip(col) {
                if *price <= Decimal::ZERO {
                    return Err(PairsError::InvalidInput {
                        field: sym.clone(),
                        reason: format!("Non-positive price {price} on {date}"),
                    });
                }
                let f = price.to_f64().ok_or_else(|| PairsError::InvalidInput {
                    field: sym.clone(),
                    reason: format!("Price {price} on {date} is not representable as f64"),
                })?;
                floats.push(f);
            }
            values.push(floats);
        }

        Ok(Self {
            dates,
            symbols,
            columns,
            values,
        })
    }

    /// Join independently retrieved per-symbol series on their common dates.
    ///
    /// Dates missing from any series are dropped, so the resulting columns
    /// always share one index.
    pub fn from_series(series: Vec<(Symbol, Vec<(NaiveDate, Money)>)>) -> PairsResult<Self> {
        if series.is_empty() {
            return Err(PairsError::InsufficientData(
                "No price series to join".into(),
            ));
        }

        let mut common: Vec<NaiveDate> = series[0].1.iter().map(|(d, _)| *d).collect();
        common.sort_unstable();
        common.dedup();
        for (_, points) in &series[1..] {
            let mut dates: Vec<NaiveDate> = points.iter().map(|(d, _)| *d).collect();
            dates.sort_unstable();
            common.retain(|d| dates.binary_search(d).is_ok());
        }

        let mut symbols = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for (sym, mut points) in series {
            points.sort_by_key(|(d, _)| *d);
            if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
                return Err(PairsError::DateError(format!(
                    "Duplicate date {} in series '{}'",
                    w[0].0, sym
                )));
            }
            let column: Vec<Money> = points
                .into_iter()
                .filter(|(d, _)| common.binary_search(d).is_ok())
                .map(|(_, p)| p)
                .collect();
            symbols.push(sym);
            columns.push(column);
        }

        Self::new(common, symbols, columns)
    }

    /// Number of dates (rows).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn index_of(&self, symbol: &str) -> PairsResult<usize> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .ok_or_else(|| PairsError::UnknownSymbol(symbol.to_string()))
    }

    /// Exact prices for a symbol.
    pub fn column(&self, symbol: &str) -> PairsResult<&[Money]> {
        let idx = self.index_of(symbol)?;
        Ok(&self.columns[idx])
    }

    /// Floating-point prices for the column at `idx`.
    pub fn values(&self, idx: usize) -> &[f64] {
        &self.values[idx]
    }

    /// Floating-point prices for a symbol.
    pub fn values_of(&self, symbol: &str) -> PairsResult<&[f64]> {
        let idx = self.index_of(symbol)?;
        Ok(&self.values[idx])
    }

    /// Rows with `start <= date < end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> PairsResult<Self> {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d < end)
            .map(|(i, _)| i)
            .collect();
        let dates = keep.iter().map(|&i| self.dates[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|col| keep.iter().map(|&i| col[i]).collect())
            .collect();
        Self::new(dates, self.symbols.clone(), columns)
    }

    /// Keep only the listed symbols, in the listed order.
    pub fn select(&self, symbols: &[Symbol]) -> PairsResult<Self> {
        let mut columns = Vec::with_capacity(symbols.len());
        for sym in symbols {
            columns.push(self.column(sym)?.to_vec());
        }
        Self::new(self.dates.clone(), symbols.to_vec(), columns)
    }
}

// ---------------------------------------------------------------------------
// Pair matrices
// ---------------------------------------------------------------------------

/// Square matrix indexed by symbol position. Only the upper triangle
/// (i < j) is ever written; every other cell keeps the fill value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMatrix {
    pub symbols: Vec<Symbol>,
    pub fill: f64,
    pub values: Vec<Vec<f64>>,
}

impl PairMatrix {
    pub fn filled(symbols: &[Symbol], fill: f64) -> Self {
        let n = symbols.len();
        Self {
            symbols: symbols.to_vec(),
            fill,
            values: vec![vec![fill; n]; n],
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Write an upper-triangle cell. Writes on or below the diagonal are ignored.
    pub fn set_upper(&mut self, i: usize, j: usize, value: f64) {
        if i < j {
            self.values[i][j] = value;
        }
    }

    pub fn dim(&self) -> usize {
        self.symbols.len()
    }
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
