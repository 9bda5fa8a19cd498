mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::study::{PairArgs, StudyArgs};

/// Cointegration-based pairs trading study
#[derive(Parser)]
#[command(
    name = "pairs",
    version,
    about = "Cointegration-based pairs trading study",
    long_about = "Scan a basket of equities for cointegrated pairs, model the spread of \
                  a chosen pair, turn its z-score into long/short/flat signals and \
                  backtest them. Prices come from a CSV file, Yahoo Finance, or a \
                  seeded synthetic generator."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log progress to stderr at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Test every pair of symbols for cointegration
    Scan(StudyArgs),
    /// Fit the hedge ratio and spread for a pair
    Spread(PairArgs),
    /// Run the full study and summarise the backtest
    Backtest(PairArgs),
    /// Run the full study and emit one row per date
    Series(PairArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Scan(args) => commands::study::run_scan(args),
        Commands::Spread(args) => commands::study::run_spread(args),
        Commands::Backtest(args) => commands::study::run_backtest(args),
        Commands::Series(args) => commands::study::run_series(args),
        Commands::Version => {
            println!("pairs {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
