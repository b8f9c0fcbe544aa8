use std::path::PathBuf;

use clap::Parser;
use time::{macros::format_description, Date};
use tracing_subscriber::EnvFilter;

use sales_trends::{run, RunOptions};

/// Aggregate a sales-ledger spreadsheet by category and month, and write
/// derived tables, a trend chart and a short report.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input spreadsheet (xlsx, xlsm, xlsb, xls, ods or csv)
    #[arg(long)]
    input: PathBuf,

    /// Directory for the output files, created if absent
    #[arg(long)]
    output_dir: PathBuf,

    /// Worksheet name (defaults to the first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Keep only rows on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date)]
    start: Option<Date>,

    /// Keep only rows on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date)]
    end: Option<Date>,

    /// Number of categories to draw in the trend chart
    #[arg(long, default_value_t = 10)]
    top_n: usize,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_cli_date(s: &str) -> Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let opts = RunOptions {
        input: cli.input,
        output_dir: cli.output_dir,
        sheet: cli.sheet,
        start: cli.start,
        end: cli.end,
        top_n: cli.top_n,
    };
    let summary = run(&opts)?;
    println!(
        "Analysed {} rows into {} months x {} categories; outputs in {}",
        summary.stats.rows_kept,
        summary.months,
        summary.categories,
        opts.output_dir.display()
    );
    Ok(())
}
