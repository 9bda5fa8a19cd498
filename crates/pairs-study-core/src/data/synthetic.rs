use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::info;

use super::{check_request, require_rows, PriceSource};
use crate::error::PairsError;
use crate::types::{Money, PriceTable, Symbol};
use crate::PairsResult;

/// `symbol = ratio * base + N(0, noise)` on every date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedSeries {
    pub symbol: Symbol,
    pub base: Symbol,
    pub ratio: f64,
    pub noise: f64,
}

/// Seeded offline price generator.
///
/// Unlinked symbols follow independent geometric random walks; linked
/// symbols track their base with Gaussian noise, which makes them
/// cointegrated with it by construction. Dates are weekdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSource {
    pub seed: u64,
    pub start_price: f64,
    /// Mean daily log return
    pub drift: f64,
    /// Standard deviation of daily log returns
    pub volatility: f64,
    pub links: Vec<LinkedSeries>,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            seed: 7,
            start_price: 100.0,
            drift: 0.0002,
            volatility: 0.015,
            links: Vec::new(),
        }
    }
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn with_link(mut self, symbol: &str, base: &str, ratio: f64, noise: f64) -> Self {
        self.links.push(LinkedSeries {
            symbol: symbol.to_string(),
            base: base.to_string(),
            ratio,
            noise,
        });
        self
    }

    fn link_for(&self, symbol: &str) -> Option<&LinkedSeries> {
        self.links.iter().find(|l| l.symbol == symbol)
    }

    fn validate(&self) -> PairsResult<()> {
        if !(self.start_price > 0.0) {
            return Err(PairsError::InvalidInput {
                field: "start_price".into(),
                reason: "Must be positive".into(),
            });
        }
        if !(self.volatility >= 0.0) {
            return Err(PairsError::InvalidInput {
                field: "volatility".into(),
                reason: "Must be non-negative".into(),
            });
        }
        for link in &self.links {
            if link.symbol == link.base || self.link_for(&link.base).is_some() {
                return Err(PairsError::InvalidInput {
                    field: "links".into(),
                    reason: format!(
                        "'{}' must be linked to an unlinked base, got '{}'",
                        link.symbol, link.base
                    ),
                });
            }
            if !(link.noise >= 0.0) {
                return Err(PairsError::InvalidInput {
                    field: "links".into(),
                    reason: format!("Noise for '{}' must be non-negative", link.symbol),
                });
            }
        }
        Ok(())
    }

    fn walk(&self, rng: &mut StdRng, n: usize) -> PairsResult<Vec<f64>> {
        let step = normal(self.drift, self.volatility)?;
        let mut level = self.start_price;
        Ok((0..n)
            .map(|_| {
                level *= step.sample(rng).exp();
                level
            })
            .collect())
    }
}

impl PriceSource for SyntheticSource {
    fn fetch(&self, symbols: &[Symbol], start: NaiveDate, end: NaiveDate) -> PairsResult<PriceTable> {
        check_request(symbols, start, end)?;
        self.validate()?;

        let dates = business_days(start, end);
        let n = dates.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut walks: HashMap<&str, Vec<f64>> = HashMap::new();

        for sym in symbols.iter().filter(|s| self.link_for(s).is_none()) {
            let path = self.walk(&mut rng, n)?;
            walks.insert(sym.as_str(), path);
        }

        let mut columns = Vec::with_capacity(symbols.len());
        for sym in symbols {
            let path = match self.link_for(sym) {
                None => walks[sym.as_str()].clone(),
                Some(link) => {
                    if !walks.contains_key(link.base.as_str()) {
                        let base = self.walk(&mut rng, n)?;
                        walks.insert(link.base.as_str(), base);
                    }
                    let noise = normal(0.0, link.noise)?;
                    walks[link.base.as_str()]
                        .iter()
                        .map(|b| link.ratio * b + noise.sample(&mut rng))
                        .collect()
                }
            };
            columns.push(to_money(sym, &path)?);
        }

        let table = require_rows(PriceTable::new(dates, symbols.to_vec(), columns)?, "synthetic")?;
        info!(
            rows = table.len(),
            symbols = symbols.len(),
            seed = self.seed,
            "generated synthetic prices"
        );
        Ok(table)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Weekdays in `[start, end)`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut day = start;
    while day < end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day += Duration::days(1);
    }
    out
}

fn normal(mean: f64, std: f64) -> PairsResult<Normal> {
    // statrs rejects a zero standard deviation
    let std = std.max(f64::MIN_POSITIVE);
    Normal::new(mean, std).map_err(|e| PairsError::InvalidInput {
        field: "distribution".into(),
        reason: e.to_string(),
    })
}

fn to_money(symbol: &str, path: &[f64]) -> PairsResult<Vec<Money>> {
    path.iter()
        .map(|p| {
            Decimal::from_f64(*p)
                .map(|d| d.round_dp(6))
                .ok_or_else(|| PairsError::InvalidInput {
                    field: symbol.to_string(),
                    reason: format!("Generated price {p} is not representable"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn syms(list: &[&str]) -> Vec<Symbol> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // 2021-01-01 is a Friday
        let days = business_days(d(2021, 1, 1), d(2021, 1, 8));
        assert_eq!(
            days,
            vec![d(2021, 1, 1), d(2021, 1, 4), d(2021, 1, 5), d(2021, 1, 6), d(2021, 1, 7)]
        );
    }

    #[test]
    fn test_same_seed_same_prices() {
        let src = SyntheticSource::new(11);
        let a = src.fetch(&syms(&["X", "Y"]), d(2020, 1, 1), d(2020, 6, 1)).unwrap();
        let b = src.fetch(&syms(&["X", "Y"]), d(2020, 1, 1), d(2020, 6, 1)).unwrap();
        assert_eq!(a.column("X").unwrap(), b.column("X").unwrap());
        assert_eq!(a.column("Y").unwrap(), b.column("Y").unwrap());
        assert_ne!(a.column("X").unwrap(), a.column("Y").unwrap());
    }

    #[test]
    fn test_linked_series_tracks_base() {
        let src = SyntheticSource::new(3).with_link("B", "A", 2.0, 0.5);
        let table = src.fetch(&syms(&["A", "B"]), d(2019, 1, 1), d(2020, 1, 1)).unwrap();
        let a = table.values_of("A").unwrap();
        let b = table.values_of("B").unwrap();
        let max_gap = a
            .iter()
            .zip(b)
            .map(|(x, y)| (y - 2.0 * x).abs())
            .fold(0.0_f64, f64::max);
        assert!(max_gap < 3.0, "max gap {max_gap}");
    }

    #[test]
    fn test_link_base_need_not_be_requested() {
        let src = SyntheticSource::new(3).with_link("B", "A", 1.5, 0.1);
        let table = src.fetch(&syms(&["B"]), d(2019, 1, 1), d(2019, 3, 1)).unwrap();
        assert_eq!(table.symbols(), &["B".to_string()]);
    }

    #[test]
    fn test_chained_links_rejected() {
        let src = SyntheticSource::new(3)
            .with_link("B", "A", 1.0, 0.1)
            .with_link("C", "B", 1.0, 0.1);
        assert!(src.fetch(&syms(&["A", "B", "C"]), d(2019, 1, 1), d(2019, 3, 1)).is_err());
    }
}
