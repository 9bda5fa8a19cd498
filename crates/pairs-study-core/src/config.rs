use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{CsvPriceSource, PriceSource};
use crate::error::PairsError;
use crate::scanner::DEFAULT_SIGNIFICANCE;
use crate::signal::{ZScoreMode, DEFAULT_ENTRY_THRESHOLD};
use crate::spread::HedgeMode;
use crate::types::{Symbol, SymbolPair};
use crate::PairsResult;

#[cfg(feature = "synthetic")]
use crate::data::SyntheticSource;
#[cfg(feature = "fetch")]
use crate::data::YahooPriceSource;

/// Large-cap technology names plus the S&P 500 ETF.
pub const DEFAULT_SYMBOLS: [&str; 11] = [
    "AAPL", "ADBE", "ORCL", "EBAY", "MSFT", "QCOM", "HPQ", "JNPR", "AMD", "IBM", "SPY",
];

/// Where prices come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Wide CSV file of adjusted closes
    Csv { path: PathBuf },
    /// Yahoo Finance chart API (requires the `fetch` feature)
    #[default]
    Yahoo,
    /// Seeded generator for offline runs
    #[cfg(feature = "synthetic")]
    Synthetic(SyntheticSource),
}

impl SourceConfig {
    pub fn build(&self) -> PairsResult<Box<dyn PriceSource>> {
        match self {
            SourceConfig::Csv { path } => Ok(Box::new(CsvPriceSource::new(path.clone()))),
            #[cfg(feature = "fetch")]
            SourceConfig::Yahoo => Ok(Box::new(YahooPriceSource::new())),
            #[cfg(not(feature = "fetch"))]
            SourceConfig::Yahoo => Err(PairsError::DataSource(
                "Yahoo source requires the 'fetch' feature".into(),
            )),
            #[cfg(feature = "synthetic")]
            SourceConfig::Synthetic(src) => Ok(Box::new(src.clone())),
        }
    }
}

/// Parameters for one end-to-end study.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub symbols: Vec<Symbol>,
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    pub significance: f64,
    pub entry_threshold: f64,
    pub hedge_mode: HedgeMode,
    pub zscore_mode: ZScoreMode,
    pub source: SourceConfig,
    /// Pair to model; when absent the most significant scanned pair is used
    pub pair: Option<SymbolPair>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            start: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            significance: DEFAULT_SIGNIFICANCE,
            entry_threshold: DEFAULT_ENTRY_THRESHOLD,
            hedge_mode: HedgeMode::default(),
            zscore_mode: ZScoreMode::default(),
            source: SourceConfig::default(),
            pair: None,
        }
    }
}

impl StudyConfig {
    pub fn validate(&self) -> PairsResult<()> {
        if self.symbols.len() < 2 {
            return Err(PairsError::InvalidInput {
                field: "symbols".into(),
                reason: format!("At least 2 symbols required, got {}", self.symbols.len()),
            });
        }
        for (i, sym) in self.symbols.iter().enumerate() {
            if sym.trim().is_empty() {
                return Err(PairsError::InvalidInput {
                    field: "symbols".into(),
                    reason: "Symbols must not be blank".into(),
                });
            }
            if self.symbols[..i].contains(sym) {
                return Err(PairsError::InvalidInput {
                    field: "symbols".into(),
                    reason: format!("Duplicate symbol '{sym}'"),
                });
            }
        }
        if self.start >= self.end {
            return Err(PairsError::DateError(format!(
                "Start date {} must be before end date {}",
                self.start, self.end
            )));
        }
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(PairsError::InvalidInput {
                field: "significance".into(),
                reason: format!("Must be in (0, 1), got {}", self.significance),
            });
        }
        if !(self.entry_threshold > 0.0 && self.entry_threshold.is_finite()) {
            return Err(PairsError::InvalidInput {
                field: "entry_threshold".into(),
                reason: format!("Must be positive, got {}", self.entry_threshold),
            });
        }
        if let HedgeMode::Rolling { window } = self.hedge_mode {
            check_window("hedge_mode.window", window)?;
        }
        if let ZScoreMode::Rolling { window } = self.zscore_mode {
            check_window("zscore_mode.window", window)?;
        }
        if let Some(pair) = &self.pair {
            for sym in [&pair.first, &pair.second] {
                if !self.symbols.contains(sym) {
                    return Err(PairsError::UnknownSymbol(sym.clone()));
                }
            }
            if pair.first == pair.second {
                return Err(PairsError::InvalidInput {
                    field: "pair".into(),
                    reason: "Pair needs two distinct symbols".into(),
                });
            }
        }
        Ok(())
    }
}

fn check_window(field: &str, window: usize) -> PairsResult<()> {
    if window < 2 {
        return Err(PairsError::InvalidInput {
            field: field.into(),
            reason: format!("Rolling window must be at least 2, got {window}"),
        });
    }
    Ok(())
}
