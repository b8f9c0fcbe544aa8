//! Monthly sales trend analysis for ledger spreadsheets.
//!
//! One invocation runs a single linear pipeline over one input file:
//! load, normalize columns, aggregate by (month, category), pivot,
//! month-over-month change, chart, report. Reruns on the same input
//! overwrite the outputs with identical bytes.

pub mod aggregate;
pub mod chart;
pub mod columns;
pub mod error;
pub mod export;
pub mod loader;
pub mod report;

use std::path::{Path, PathBuf};

use time::Date;
use tracing::info;

use crate::aggregate::{aggregate, Pivot};
use crate::columns::{detect_columns, normalize, CoercionStats};
use crate::error::{AnalysisError, Result};
use crate::loader::load_table;

pub const AGGREGATED_CSV: &str = "aggregated_by_category_month.csv";
pub const PIVOT_CSV: &str = "sales_pivot.csv";
pub const CHANGE_CSV: &str = "sales_pct_change.csv";
pub const CHART_PNG: &str = "sales_trends_top.png";
pub const REPORT_MD: &str = "report.md";

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Worksheet name; first sheet when absent. Ignored for CSV inputs.
    pub sheet: Option<String>,
    /// Inclusive date filter bounds.
    pub start: Option<Date>,
    pub end: Option<Date>,
    /// Number of categories to chart.
    pub top_n: usize,
}

impl RunOptions {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            sheet: None,
            start: None,
            end: None,
            top_n: 10,
        }
    }
}

/// Counts reported back to the caller after a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: CoercionStats,
    pub months: usize,
    pub categories: usize,
}

/// Runs the whole pipeline.
///
/// The output directory is only created once column detection and
/// normalization have succeeded, so fatal input problems leave no
/// partial output behind.
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    info!("reading {}", opts.input.display());
    let table = load_table(&opts.input, opts.sheet.as_deref())?;

    let map = detect_columns(&table.headers)?;
    let (records, stats) = normalize(&table, &map, opts.start, opts.end);
    if records.is_empty() {
        return Err(AnalysisError::NoData);
    }
    info!(
        rows_read = stats.rows_read,
        rows_kept = stats.rows_kept,
        "normalized input rows"
    );

    let totals = aggregate(&records);
    let pivot = Pivot::build(&totals);
    let change = pivot.pct_change();

    std::fs::create_dir_all(&opts.output_dir)?;
    export::write_aggregated_csv(&totals, opts.output_dir.join(AGGREGATED_CSV))?;
    export::write_pivot_csv(&pivot, opts.output_dir.join(PIVOT_CSV))?;
    export::write_change_csv(&change, opts.output_dir.join(CHANGE_CSV))?;
    chart::render_trend_chart(&pivot, opts.top_n, opts.output_dir.join(CHART_PNG))?;
    report::write_report(&pivot, &stats, opts.top_n, opts.output_dir.join(REPORT_MD))?;

    info!("analysis complete, outputs in {}", opts.output_dir.display());
    Ok(RunSummary {
        stats,
        months: pivot.months.len(),
        categories: pivot.categories.len(),
    })
}
