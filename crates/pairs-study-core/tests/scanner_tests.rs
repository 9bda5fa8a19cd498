use chrono::{Duration, NaiveDate};
use pairs_study_core::cointegration::engle_granger;
use pairs_study_core::scanner::scan_pairs;
use pairs_study_core::spread::{model_spread, HedgeMode};
use pairs_study_core::stats::ols::simple_ols;
use pairs_study_core::{PairsError, PriceTable, SymbolPair};
use pretty_assertions::assert_eq;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use statrs::distribution::Normal;

// ===========================================================================
// Cointegration scanner and spread modeller, exercised through the public API
// ===========================================================================

const FIVE_YEARS: usize = 1260;

fn random_walk(rng: &mut StdRng, n: usize, start: f64, step_std: f64) -> Vec<f64> {
    let step = Normal::new(0.0, step_std).unwrap();
    let mut level = start;
    (0..n)
        .map(|_| {
            level += step.sample(rng);
            level
        })
        .collect()
}

fn table(columns: Vec<(&str, Vec<f64>)>) -> PriceTable {
    let n = columns[0].1.len();
    let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
    let dates = (0..n).map(|i| start + Duration::days(i as i64)).collect();
    let (symbols, values): (Vec<String>, Vec<Vec<Decimal>>) = columns
        .into_iter()
        .map(|(s, v)| {
            (
                s.to_string(),
                v.iter().map(|x| Decimal::from_f64(*x).unwrap()).collect(),
            )
        })
        .unzip();
    PriceTable::new(dates, symbols, values).unwrap()
}

// ---------------------------------------------------------------------------
// Pair counts and matrix layout
// ---------------------------------------------------------------------------

#[test]
fn test_scan_evaluates_every_unordered_pair() {
    let mut rng = StdRng::seed_from_u64(100);
    for n in 2..=6 {
        let names = ["S0", "S1", "S2", "S3", "S4", "S5"];
        let columns = (0..n)
            .map(|i| (names[i], random_walk(&mut rng, 150, 500.0, 1.0)))
            .collect();
        let scan = scan_pairs(&table(columns), 0.05).unwrap();
        assert_eq!(scan.pairs_tested(), n * (n - 1) / 2);
        assert_eq!(scan.p_values.dim(), n);
        for t in &scan.tests {
            assert!((0.0..=1.0).contains(&t.test.p_value));
        }
        for i in 0..n {
            for j in 0..=i {
                assert_eq!(scan.scores.get(i, j), 0.0);
                assert_eq!(scan.p_values.get(i, j), 1.0);
            }
        }
    }
}

#[test]
fn test_scan_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(8);
    let a = random_walk(&mut rng, 200, 300.0, 1.0);
    let b = random_walk(&mut rng, 200, 300.0, 1.0);
    let c = random_walk(&mut rng, 200, 300.0, 1.0);
    let prices = table(vec![("A", a), ("B", b), ("C", c)]);
    let first = scan_pairs(&prices, 0.05).unwrap();
    let second = scan_pairs(&prices, 0.05).unwrap();
    assert_eq!(first.p_values, second.p_values);
    assert_eq!(first.scores, second.scores);
    assert_eq!(first.pairs, second.pairs);
}

// ---------------------------------------------------------------------------
// Degenerate inputs
// ---------------------------------------------------------------------------

#[test]
fn test_identical_columns_report_no_evidence() {
    let mut rng = StdRng::seed_from_u64(3);
    let a = random_walk(&mut rng, 120, 80.0, 1.0);
    let prices = table(vec![("A", a.clone()), ("A2", a)]);
    let scan = scan_pairs(&prices, 0.05).unwrap();
    assert_eq!(scan.tests[0].test.p_value, 1.0);
    assert!(scan.tests[0].test.collinear);
    assert!(scan.pairs.is_empty());
    assert!(scan.best_pair().is_none());
}

#[test]
fn test_constant_column_aborts_scan_naming_pair() {
    let mut rng = StdRng::seed_from_u64(4);
    let a = random_walk(&mut rng, 120, 80.0, 1.0);
    let b = random_walk(&mut rng, 120, 80.0, 1.0);
    let prices = table(vec![("A", a), ("B", b), ("FLAT", vec![42.0; 120])]);
    match scan_pairs(&prices, 0.05) {
        Err(PairsError::PairTestFailed { first, second, source }) => {
            assert_eq!((first.as_str(), second.as_str()), ("A", "FLAT"));
            assert!(matches!(*source, PairsError::DivisionByZero { .. }));
        }
        other => panic!("expected PairTestFailed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Statistical behaviour
// ---------------------------------------------------------------------------

#[test]
fn test_linked_pair_over_five_years() {
    let mut rng = StdRng::seed_from_u64(2013);
    let a = random_walk(&mut rng, FIVE_YEARS, 200.0, 1.0);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let b: Vec<f64> = a.iter().map(|x| 2.0 * x + noise.sample(&mut rng)).collect();
    let prices = table(vec![("A", a), ("B", b)]);

    let scan = scan_pairs(&prices, 0.05).unwrap();
    assert!(scan.tests[0].test.p_value < 1e-3, "p = {}", scan.tests[0].test.p_value);
    assert_eq!(scan.pairs, vec![SymbolPair::new("A", "B")]);

    let model = model_spread(&prices, &SymbolPair::new("A", "B"), HedgeMode::Static).unwrap();
    assert!((model.hedge_ratio - 2.0).abs() < 0.01, "beta = {}", model.hedge_ratio);
}

#[test]
fn test_linked_pair_with_small_noise_qualifies() {
    let mut rng = StdRng::seed_from_u64(2018);
    let a = random_walk(&mut rng, FIVE_YEARS, 200.0, 1.0);
    for sd in [0.01, 0.02, 0.05] {
        let noise = Normal::new(0.0, sd).unwrap();
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x + noise.sample(&mut rng)).collect();
        let prices = table(vec![("A", a.clone()), ("B", b)]);

        let scan = scan_pairs(&prices, 0.05).unwrap();
        let test = &scan.tests[0].test;
        assert!(!test.collinear, "noise sd {sd}");
        assert!(test.p_value < 1e-3, "noise sd {sd}: p = {}", test.p_value);
        assert_eq!(scan.pairs, vec![SymbolPair::new("A", "B")]);
        assert_eq!(scan.collinear_pairs().count(), 0);
    }
}

#[test]
fn test_spread_residual_has_no_slope_on_first_leg() {
    let mut rng = StdRng::seed_from_u64(77);
    let a = random_walk(&mut rng, 400, 60.0, 0.8);
    let b = random_walk(&mut rng, 400, 90.0, 0.8);
    let prices = table(vec![("A", a), ("B", b)]);
    let model = model_spread(&prices, &SymbolPair::new("A", "B"), HedgeMode::Static).unwrap();
    let residual: Vec<f64> = model.spread.iter().map(|s| s - model.intercept).collect();
    let refit = simple_ols(&residual, prices.values_of("A").unwrap()).unwrap();
    assert!(refit.slope.abs() < 1e-9, "slope {}", refit.slope);
}

#[test]
fn test_independent_walks_rarely_pass() {
    let mut rng = StdRng::seed_from_u64(31337);
    let trials = 200;
    let mut passed = 0;
    let mut total_p = 0.0;
    for _ in 0..trials {
        let a = random_walk(&mut rng, 250, 100.0, 1.0);
        let b = random_walk(&mut rng, 250, 100.0, 1.0);
        let p = engle_granger(&a, &b).unwrap().p_value;
        total_p += p;
        if p < 0.05 {
            passed += 1;
        }
    }
    let rate = passed as f64 / trials as f64;
    assert!(rate < 0.15, "false positive rate {rate}");
    assert!(total_p / trials as f64 > 0.25, "mean p {}", total_p / trials as f64);
}
