use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cointegration::{self, CointegrationTest};
use crate::error::PairsError;
use crate::types::{PairMatrix, PriceTable, Symbol, SymbolPair};
use crate::PairsResult;

/// Significance level used when none is configured.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

const SCORE_FILL: f64 = 0.0;
const P_VALUE_FILL: f64 = 1.0;

/// One evaluated pair, in scan order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairTest {
    pub pair: SymbolPair,
    pub test: CointegrationTest,
}

/// Output of a full pairwise scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Test statistics; 0 on and below the diagonal
    pub scores: PairMatrix,
    /// P-values; 1 on and below the diagonal
    pub p_values: PairMatrix,
    /// Pairs with `p_value < significance`, in scan order
    pub pairs: Vec<SymbolPair>,
    /// Every evaluated pair, in scan order
    pub tests: Vec<PairTest>,
    pub significance: f64,
}

impl ScanResult {
    pub fn pairs_tested(&self) -> usize {
        self.tests.len()
    }

    /// Qualifying pair with the smallest p-value. Earlier scan order wins ties.
    pub fn best_pair(&self) -> Option<&PairTest> {
        self.tests
            .iter()
            .filter(|t| t.test.p_value < self.significance)
            .fold(None, |best: Option<&PairTest>, t| match best {
                Some(b) if b.test.p_value <= t.test.p_value => Some(b),
                _ => Some(t),
            })
    }

    /// Pairs expected to pass by chance alone when every null is true.
    pub fn expected_false_positives(&self) -> f64 {
        self.pairs_tested() as f64 * self.significance
    }

    pub fn heatmap(&self) -> Heatmap {
        Heatmap::from_scan(self)
    }

    /// Test for the two symbols of `pair`, in whichever order they were scanned.
    pub fn test_for(&self, pair: &SymbolPair) -> Option<&PairTest> {
        self.tests.iter().find(|t| {
            (t.pair.first == pair.first && t.pair.second == pair.second)
                || (t.pair.first == pair.second && t.pair.second == pair.first)
        })
    }

    pub fn collinear_pairs(&self) -> impl Iterator<Item = &SymbolPair> {
        self.tests.iter().filter(|t| t.test.collinear).map(|t| &t.pair)
    }
}

/// P-value grid with every cell at or above the threshold masked out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub symbols: Vec<Symbol>,
    pub threshold: f64,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl Heatmap {
    fn from_scan(scan: &ScanResult) -> Self {
        let n = scan.p_values.dim();
        let cells = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let p = scan.p_values.get(i, j);
                        (i < j && p < scan.significance).then_some(p)
                    })
                    .collect()
            })
            .collect();
        Self {
            symbols: scan.p_values.symbols.clone(),
            threshold: scan.significance,
            cells,
        }
    }
}

/// Test every unordered pair of columns for cointegration.
///
/// Pairs are visited as `(i, j)` with `i < j` in column order, and each test
/// regresses column `i` on column `j`. No multiple-comparison correction is
/// applied. The scan stops at the first failing test.
pub fn scan_pairs(prices: &PriceTable, significance: f64) -> PairsResult<ScanResult> {
    if !(significance > 0.0 && significance < 1.0) {
        return Err(PairsError::InvalidInput {
            field: "significance".into(),
            reason: format!("Significance must be in (0, 1), got {significance}"),
        });
    }
    let symbols = prices.symbols();
    let n = symbols.len();
    if n < 2 {
        return Err(PairsError::InsufficientData(format!(
            "At least 2 symbols required for a pair scan, got {n}"
        )));
    }

    let mut scores = PairMatrix::filled(symbols, SCORE_FILL);
    let mut p_values = PairMatrix::filled(symbols, P_VALUE_FILL);
    let mut pairs = Vec::new();
    let mut tests = Vec::with_capacity(n * (n - 1) / 2);

    info!(
        symbols = n,
        observations = prices.len(),
        pairs = n * (n - 1) / 2,
        "scanning pairs for cointegration"
    );

    for i in 0..n {
        for j in (i + 1)..n {
            let pair = SymbolPair::new(symbols[i].clone(), symbols[j].clone());
            let test = cointegration::engle_granger(prices.values(i), prices.values(j))
                .map_err(|e| PairsError::PairTestFailed {
                    first: pair.first.clone(),
                    second: pair.second.clone(),
                    source: Box::new(e),
                })?;

            if test.collinear {
                warn!(pair = %pair, "series are perfectly collinear; test is not informative");
            }
            debug!(
                pair = %pair,
                statistic = test.statistic,
                p_value = test.p_value,
                lag = test.used_lag,
                "pair tested"
            );

            scores.set_upper(i, j, test.statistic);
            p_values.set_upper(i, j, test.p_value);
            if test.p_value < significance {
                pairs.push(pair.clone());
            }
            tests.push(PairTest { pair, test });
        }
    }

    info!(found = pairs.len(), tested = tests.len(), "pair scan complete");

    Ok(ScanResult {
        scores,
        p_values,
        pairs,
        tests,
        significance,
    })
}
