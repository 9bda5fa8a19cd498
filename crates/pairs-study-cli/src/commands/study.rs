use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde_json::Value;
use tracing::debug;

use pairs_study_core::config::{SourceConfig, StudyConfig};
use pairs_study_core::data::SyntheticSource;
use pairs_study_core::pipeline;
use pairs_study_core::signal::ZScoreMode;
use pairs_study_core::spread::HedgeMode;
use pairs_study_core::SymbolPair;

use crate::input;

type CmdResult = Result<Value, Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceKind {
    Csv,
    Yahoo,
    Synthetic,
}

/// Study configuration and overrides shared by every command
#[derive(Args)]
pub struct StudyArgs {
    /// Path to a study config (JSON, or YAML for .yaml/.yml)
    #[arg(long)]
    pub config: Option<String>,

    /// Comma-separated symbols to scan
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// First date (inclusive), YYYY-MM-DD
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date (exclusive), YYYY-MM-DD
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Cointegration significance level
    #[arg(long)]
    pub significance: Option<f64>,

    /// Z-score entry threshold
    #[arg(long)]
    pub entry: Option<f64>,

    /// Wide CSV of adjusted closes (implies --source csv)
    #[arg(long)]
    pub prices: Option<PathBuf>,

    /// Price source
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Seed for the synthetic source
    #[arg(long)]
    pub seed: Option<u64>,

    /// Re-estimate the hedge ratio over a trailing window of this many days
    #[arg(long)]
    pub hedge_window: Option<usize>,

    /// Normalise the spread over a trailing window of this many days
    #[arg(long)]
    pub zscore_window: Option<usize>,
}

/// Arguments for commands that model a single pair
#[derive(Args)]
pub struct PairArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// Pair to model, e.g. ADBE,MSFT (default: most significant scanned pair)
    #[arg(long)]
    pub pair: Option<SymbolPair>,
}

pub fn run_scan(args: StudyArgs) -> CmdResult {
    let config = load_config(&args)?;
    let source = config.source.build()?;
    let result = pipeline::scan_report(&config, source.as_ref())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_spread(args: PairArgs) -> CmdResult {
    let config = load_pair_config(&args)?;
    let source = config.source.build()?;
    let result = pipeline::spread_report(&config, source.as_ref())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_backtest(args: PairArgs) -> CmdResult {
    let config = load_pair_config(&args)?;
    let source = config.source.build()?;
    let result = pipeline::study_report(&config, source.as_ref())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_series(args: PairArgs) -> CmdResult {
    let config = load_pair_config(&args)?;
    let source = config.source.build()?;
    let result = pipeline::series_report(&config, source.as_ref())?;
    Ok(serde_json::to_value(result)?)
}

fn load_pair_config(args: &PairArgs) -> Result<StudyConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.study)?;
    if let Some(pair) = &args.pair {
        config.pair = Some(pair.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Config file or piped JSON, else defaults; then flag overrides.
fn load_config(args: &StudyArgs) -> Result<StudyConfig, Box<dyn std::error::Error>> {
    let mut config: StudyConfig = if let Some(ref path) = args.config {
        input::file::read_config(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        StudyConfig::default()
    };

    if let Some(symbols) = &args.symbols {
        config.symbols = symbols.iter().map(|s| s.trim().to_string()).collect();
    }
    if let Some(start) = args.start {
        config.start = start;
    }
    if let Some(end) = args.end {
        config.end = end;
    }
    if let Some(significance) = args.significance {
        config.significance = significance;
    }
    if let Some(entry) = args.entry {
        config.entry_threshold = entry;
    }
    if let Some(window) = args.hedge_window {
        config.hedge_mode = HedgeMode::Rolling { window };
    }
    if let Some(window) = args.zscore_window {
        config.zscore_mode = ZScoreMode::Rolling { window };
    }

    match (args.source, &args.prices) {
        (Some(SourceKind::Csv) | None, Some(path)) => {
            config.source = SourceConfig::Csv { path: path.clone() };
        }
        (Some(SourceKind::Csv), None) => {
            if !matches!(config.source, SourceConfig::Csv { .. }) {
                return Err("--source csv requires --prices <file.csv>".into());
            }
        }
        (Some(_), Some(_)) => {
            return Err("--prices only applies to the csv source".into());
        }
        (Some(SourceKind::Yahoo), None) => config.source = SourceConfig::Yahoo,
        (Some(SourceKind::Synthetic), None) => {
            if !matches!(config.source, SourceConfig::Synthetic(_)) {
                config.source = SourceConfig::Synthetic(SyntheticSource::default());
            }
        }
        (None, None) => {}
    }

    if let Some(seed) = args.seed {
        match &mut config.source {
            SourceConfig::Synthetic(src) => src.seed = seed,
            _ => return Err("--seed only applies to the synthetic source".into()),
        }
    }

    config.validate()?;
    debug!(?config, "study configuration");
    Ok(config)
}
