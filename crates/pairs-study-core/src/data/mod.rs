//! Price acquisition.
//!
//! Every source returns a [`PriceTable`] of adjusted closes for the requested
//! symbols on the half-open range `[start, end)`, with dates missing from any
//! symbol dropped.

pub mod csv_file;
#[cfg(feature = "synthetic")]
pub mod synthetic;
#[cfg(feature = "fetch")]
pub mod yahoo;

use chrono::NaiveDate;

use crate::error::PairsError;
use crate::types::{PriceTable, Symbol};
use crate::PairsResult;

pub use csv_file::CsvPriceSource;
#[cfg(feature = "synthetic")]
pub use synthetic::{LinkedSeries, SyntheticSource};
#[cfg(feature = "fetch")]
pub use yahoo::YahooPriceSource;

/// Anything that can produce an aligned table of daily adjusted closes.
pub trait PriceSource {
    fn fetch(&self, symbols: &[Symbol], start: NaiveDate, end: NaiveDate)
        -> PairsResult<PriceTable>;

    /// Short name for logs and report metadata.
    fn name(&self) -> &str;
}

/// Shared argument checks for every source.
pub(crate) fn check_request(symbols: &[Symbol], start: NaiveDate, end: NaiveDate) -> PairsResult<()> {
    if symbols.is_empty() {
        return Err(PairsError::InvalidInput {
            field: "symbols".into(),
            reason: "At least one symbol must be requested".into(),
        });
    }
    if start >= end {
        return Err(PairsError::DateError(format!(
            "Start date {start} must be before end date {end}"
        )));
    }
    Ok(())
}

/// Fail when a source produced no usable rows.
pub(crate) fn require_rows(table: PriceTable, source: &str) -> PairsResult<PriceTable> {
    if table.is_empty() {
        return Err(PairsError::InsufficientData(format!(
            "{source}: no dates with a price for every requested symbol"
        )));
    }
    Ok(table)
}
