use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use super::{check_request, require_rows, PriceSource};
use crate::error::PairsError;
use crate::types::{Money, PriceTable, Symbol};
use crate::PairsResult;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

/// Daily adjusted closes from the Yahoo Finance chart API.
///
/// One blocking request per symbol. Any HTTP or parse failure aborts the
/// whole fetch.
#[derive(Debug, Clone)]
pub struct YahooPriceSource {
    base_url: String,
}

impl Default for YahooPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooPriceSource {
    pub fn new() -> Self {
        Self {
            base_url: CHART_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=div%2Csplits",
            self.base_url,
            symbol,
            unix_seconds(start),
            unix_seconds(end)
        )
    }

    fn fetch_symbol(
        &self,
        client: &reqwest::blocking::Client,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PairsResult<Vec<(NaiveDate, Money)>> {
        let url = self.url(symbol, start, end);
        debug!(symbol, url = %url, "requesting chart");
        let body = client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| PairsError::DataSource(format!("{symbol}: {e}")))?;
        let points = parse_chart(&body, symbol)?;
        Ok(points
            .into_iter()
            .filter(|(d, _)| *d >= start && *d < end)
            .collect())
    }
}

impl PriceSource for YahooPriceSource {
    fn fetch(&self, symbols: &[Symbol], start: NaiveDate, end: NaiveDate) -> PairsResult<PriceTable> {
        check_request(symbols, start, end)?;
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PairsError::DataSource(e.to_string()))?;

        let mut series = Vec::with_capacity(symbols.len());
        for sym in symbols {
            let points = self.fetch_symbol(&client, sym, start, end)?;
            debug!(symbol = %sym, points = points.len(), "chart received");
            series.push((sym.clone(), points));
        }

        let table = require_rows(PriceTable::from_series(series)?, "yahoo")?;
        info!(rows = table.len(), symbols = symbols.len(), "downloaded prices");
        Ok(table)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Extract `(date, adjusted close)` points from a chart response body.
/// Null closes are skipped.
fn parse_chart(body: &str, symbol: &str) -> PairsResult<Vec<(NaiveDate, Money)>> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| PairsError::DataSource(format!("{symbol}: unreadable chart response: {e}")))?;

    if let Some(err) = response.chart.error {
        return Err(PairsError::DataSource(format!(
            "{symbol}: [{}] {}",
            err.code, err.description
        )));
    }

    let data = response
        .chart
        .result
        .and_then(|mut r| (!r.is_empty()).then(|| r.swap_remove(0)))
        .ok_or_else(|| PairsError::DataSource(format!("{symbol}: no chart data returned")))?;
    let closes = data
        .indicators
        .adjclose
        .and_then(|mut a| (!a.is_empty()).then(|| a.swap_remove(0)))
        .ok_or_else(|| PairsError::DataSource(format!("{symbol}: response has no adjusted closes")))?;

    let mut points = Vec::with_capacity(data.timestamp.len());
    for (ts, close) in data.timestamp.iter().zip(closes.adjclose) {
        let Some(close) = close else { continue };
        let date = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| PairsError::DateError(format!("{symbol}: bad timestamp {ts}")))?
            .date_naive();
        let price = Decimal::from_f64(close)
            .map(|d| d.round_dp(6))
            .ok_or_else(|| PairsError::DataSource(format!("{symbol}: bad price {close}")))?;
        points.push((date, price));
    }
    Ok(points)
}
