//! End-to-end study: acquire prices, scan for cointegrated pairs, model the
//! chosen pair's spread, generate signals and backtest them.
//!
//! Stages run strictly in sequence and any stage error aborts the study.

use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::{self, Backtest, BacktestSummary};
use crate::cointegration::CointegrationTest;
use crate::config::StudyConfig;
use crate::data::PriceSource;
use crate::error::PairsError;
use crate::scanner::{self, Heatmap, PairTest, ScanResult};
use crate::signal::{self, Side, SignalSeries, ZScoreMode};
use crate::spread::{self, HedgeMode, SpreadDiagnostics, SpreadModel};
use crate::types::{with_metadata, ComputationOutput, Money, PairMatrix, PriceTable, Symbol, SymbolPair};
use crate::PairsResult;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Validate the configuration and load prices for every configured symbol.
pub fn acquire(config: &StudyConfig, source: &dyn PriceSource) -> PairsResult<PriceTable> {
    config.validate()?;
    info!(
        source = source.name(),
        symbols = config.symbols.len(),
        start = %config.start,
        end = %config.end,
        "acquiring prices"
    );
    source.fetch(&config.symbols, config.start, config.end)
}

/// Pair to model: the configured one, else the most significant scanned pair.
pub fn select_pair(config: &StudyConfig, scan: &ScanResult) -> PairsResult<SymbolPair> {
    if let Some(pair) = &config.pair {
        return Ok(pair.clone());
    }
    scan.best_pair().map(|t| t.pair.clone()).ok_or_else(|| {
        PairsError::InsufficientData(format!(
            "No pair is cointegrated at significance {} ({} tested)",
            scan.significance,
            scan.pairs_tested()
        ))
    })
}

/// Every intermediate product of a study.
#[derive(Debug, Clone)]
pub struct Study {
    pub prices: PriceTable,
    pub scan: ScanResult,
    pub pair: SymbolPair,
    pub model: SpreadModel,
    pub signals: SignalSeries,
    pub backtest: Backtest,
    pub warnings: Vec<String>,
}

/// Run all four stages.
pub fn run_study(config: &StudyConfig, source: &dyn PriceSource) -> PairsResult<Study> {
    let prices = acquire(config, source)?;
    let scan = scanner::scan_pairs(&prices, config.significance)?;
    let pair = select_pair(config, &scan)?;
    let model = spread::model_spread(&prices, &pair, config.hedge_mode)?;
    let signals = signal::generate_signals(&model, config.zscore_mode, config.entry_threshold)?;
    let backtest = backtest::run_backtest(&model, &signals)?;

    let mut warnings = scan_warnings(&scan);
    warnings.extend(pair_warnings(config, &scan, &pair));
    warnings.extend(model_warnings(config, &model));

    info!(pair = %pair, total_return = backtest.summary.total_return, "study complete");

    Ok(Study {
        prices,
        scan,
        pair,
        model,
        signals,
        backtest,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub source: String,
    pub observations: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub symbols: Vec<Symbol>,
    pub significance: f64,
    pub pairs_tested: usize,
    pub expected_false_positives: f64,
    pub pairs: Vec<SymbolPair>,
    pub best_pair: Option<PairTest>,
    pub tests: Vec<PairTest>,
    pub scores: PairMatrix,
    pub p_values: PairMatrix,
    pub heatmap: Heatmap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadReport {
    pub pair: SymbolPair,
    pub cointegration: Option<CointegrationTest>,
    pub model: SpreadModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyReport {
    pub pair: SymbolPair,
    pub observations: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub pairs_tested: usize,
    pub pairs_found: Vec<SymbolPair>,
    pub cointegration: Option<CointegrationTest>,
    pub hedge_mode: HedgeMode,
    pub hedge_ratio: f64,
    pub intercept: f64,
    pub diagnostics: SpreadDiagnostics,
    pub zscore_mode: ZScoreMode,
    pub entry_threshold: f64,
    pub summary: BacktestSummary,
}

/// One date of the study, for plotting. Signal columns are empty on
/// warm-up dates that have a spread but no z-score yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRow {
    pub date: NaiveDate,
    pub first_price: Money,
    pub second_price: Money,
    pub hedge_ratio: f64,
    pub spread: f64,
    pub signal: Option<f64>,
    pub side: Option<Side>,
    pub daily_return: Option<f64>,
    pub cumulative_return: Option<f64>,
}

impl Study {
    pub fn report(&self, config: &StudyConfig) -> StudyReport {
        StudyReport {
            pair: self.pair.clone(),
            observations: self.prices.len(),
            first_date: self.prices.dates().first().copied(),
            last_date: self.prices.dates().last().copied(),
            pairs_tested: self.scan.pairs_tested(),
            pairs_found: self.scan.pairs.clone(),
            cointegration: self.scan.test_for(&self.pair).map(|t| t.test.clone()),
            hedge_mode: self.model.mode,
            hedge_ratio: self.model.hedge_ratio,
            intercept: self.model.intercept,
            diagnostics: self.model.diagnostics.clone(),
            zscore_mode: self.signals.mode,
            entry_threshold: config.entry_threshold,
            summary: self.backtest.summary.clone(),
        }
    }

    /// Per-date rows aligned on the spread's dates.
    pub fn series(&self) -> PairsResult<Vec<SeriesRow>> {
        let first = self.prices.column(&self.pair.first)?;
        let second = self.prices.column(&self.pair.second)?;
        let offset = self.model.offset(&self.prices);

        Ok((0..self.model.len())
            .map(|t| {
                let row = t
                    .checked_sub(self.signals.offset)
                    .and_then(|k| self.backtest.rows.get(k));
                SeriesRow {
                    date: self.model.dates[t],
                    first_price: first[offset + t],
                    second_price: second[offset + t],
                    hedge_ratio: self.model.hedge_ratios[t],
                    spread: self.model.spread[t],
                    signal: row.map(|r| r.signal),
                    side: row.map(|r| r.side),
                    daily_return: row.map(|r| r.daily_return),
                    cumulative_return: row.map(|r| r.cumulative_return),
                }
            })
            .collect())
    }
}

/// Acquire and scan.
pub fn scan_report(
    config: &StudyConfig,
    source: &dyn PriceSource,
) -> PairsResult<ComputationOutput<ScanReport>> {
    let start = Instant::now();
    let prices = acquire(config, source)?;
    let scan = scanner::scan_pairs(&prices, config.significance)?;
    let warnings = scan_warnings(&scan);

    let report = ScanReport {
        source: source.name().to_string(),
        observations: prices.len(),
        first_date: prices.dates().first().copied(),
        last_date: prices.dates().last().copied(),
        symbols: prices.symbols().to_vec(),
        significance: scan.significance,
        pairs_tested: scan.pairs_tested(),
        expected_false_positives: scan.expected_false_positives(),
        pairs: scan.pairs.clone(),
        best_pair: scan.best_pair().cloned(),
        heatmap: scan.heatmap(),
        tests: scan.tests,
        scores: scan.scores,
        p_values: scan.p_values,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Engle-Granger pairwise cointegration scan (MacKinnon p-values)",
        config,
        warnings,
        elapsed,
        report,
    ))
}

/// Acquire, scan, select a pair and model its spread.
pub fn spread_report(
    config: &StudyConfig,
    source: &dyn PriceSource,
) -> PairsResult<ComputationOutput<SpreadReport>> {
    let start = Instant::now();
    let prices = acquire(config, source)?;
    let scan = scanner::scan_pairs(&prices, config.significance)?;
    let pair = select_pair(config, &scan)?;
    let model = spread::model_spread(&prices, &pair, config.hedge_mode)?;

    let mut warnings = scan_warnings(&scan);
    warnings.extend(pair_warnings(config, &scan, &pair));
    if let HedgeMode::Static = model.mode {
        warnings.push(STATIC_HEDGE_WARNING.into());
    }

    let report = SpreadReport {
        cointegration: scan.test_for(&pair).map(|t| t.test.clone()),
        pair,
        model,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "OLS hedge ratio, spread = second - hedge_ratio * first",
        config,
        warnings,
        elapsed,
        report,
    ))
}

/// Full study, summarised.
pub fn study_report(
    config: &StudyConfig,
    source: &dyn PriceSource,
) -> PairsResult<ComputationOutput<StudyReport>> {
    let start = Instant::now();
    let study = run_study(config, source)?;
    let report = study.report(config);
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Cointegration scan, OLS spread, z-score threshold signal, spread-return backtest",
        config,
        study.warnings,
        elapsed,
        report,
    ))
}

/// Full study, one row per date.
pub fn series_report(
    config: &StudyConfig,
    source: &dyn PriceSource,
) -> PairsResult<ComputationOutput<Vec<SeriesRow>>> {
    let start = Instant::now();
    let study = run_study(config, source)?;
    let rows = study.series()?;
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Per-date prices, spread, signal, side and returns",
        config,
        study.warnings,
        elapsed,
        rows,
    ))
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

const STATIC_HEDGE_WARNING: &str =
    "Static hedge ratio is estimated on the whole sample; every date uses information from later dates";

fn scan_warnings(scan: &ScanResult) -> Vec<String> {
    let mut warnings = vec![format!(
        "{} pairs tested at significance {} with no multiple-comparison correction; about {:.1} would pass by chance alone",
        scan.pairs_tested(),
        scan.significance,
        scan.expected_false_positives()
    )];
    for pair in scan.collinear_pairs() {
        warnings.push(format!(
            "{pair}: series are perfectly collinear; reported as p-value 1"
        ));
    }
    warnings
}

fn pair_warnings(config: &StudyConfig, scan: &ScanResult, pair: &SymbolPair) -> Vec<String> {
    if config.pair.is_none() {
        return Vec::new();
    }
    match scan.test_for(pair) {
        Some(t) if t.test.p_value >= scan.significance => vec![format!(
            "{pair} is not cointegrated at significance {} (p-value {:.4})",
            scan.significance, t.test.p_value
        )],
        _ => Vec::new(),
    }
}

fn model_warnings(config: &StudyConfig, model: &SpreadModel) -> Vec<String> {
    let mut warnings = Vec::new();
    if let HedgeMode::Static = config.hedge_mode {
        warnings.push(STATIC_HEDGE_WARNING.into());
    }
    if !config.zscore_mode.is_causal() {
        warnings.push(
            "Full-sample z-score uses the whole period's mean and standard deviation; signals carry look-ahead bias"
                .into(),
        );
    }
    let crosses_zero = model.spread.windows(2).any(|w| w[0].signum() != w[1].signum());
    if crosses_zero {
        warnings.push(
            "Spread changes sign; percentage changes of the spread are unstable near zero".into(),
        );
    }
    warnings.push(
        "No transaction costs, slippage or position sizing; returns are percentage changes of the spread"
            .into(),
    );
    warnings
}
