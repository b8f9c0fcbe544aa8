use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::aggregate::Pivot;
use crate::columns::CoercionStats;
use crate::error::Result;

/// Relative first-to-last change below which a category counts as flat.
const FLAT_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Growing,
    Declining,
    Flat,
}

/// First-to-last movement of one category over the analysed range.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTrend {
    pub category: String,
    pub first: f64,
    pub last: f64,
    /// Change relative to the baseline magnitude; `None` when the first
    /// month is zero.
    pub relative: Option<f64>,
    pub trend: Trend,
}

fn classify(first: f64, last: f64) -> (Option<f64>, Trend) {
    if first == 0.0 {
        // No baseline: any later sales count as growth.
        let trend = if last > 0.0 { Trend::Growing } else { Trend::Flat };
        return (None, trend);
    }
    // Divide by the baseline magnitude so a refund-heavy (negative) first
    // month keeps the sign of the movement: recovering is growth.
    let relative = (last - first) / first.abs();
    let trend = if relative > FLAT_THRESHOLD {
        Trend::Growing
    } else if relative < -FLAT_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Flat
    };
    (Some(relative), trend)
}

/// First-to-last trend per category, in pivot column order.
pub fn category_trends(pivot: &Pivot) -> Vec<CategoryTrend> {
    let Some(first_row) = pivot.cells.first() else {
        return Vec::new();
    };
    let last_row = pivot.cells.last().unwrap_or(first_row);

    pivot
        .categories
        .iter()
        .enumerate()
        .map(|(ci, category)| {
            let first = first_row[ci];
            let last = last_row[ci];
            let (relative, trend) = classify(first, last);
            CategoryTrend {
                category: category.clone(),
                first,
                last,
                relative,
                trend,
            }
        })
        .collect()
}

fn format_relative(relative: Option<f64>) -> String {
    match relative {
        Some(r) => format!("{:+.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

fn push_bucket(out: &mut String, title: &str, trends: &[&CategoryTrend]) {
    let _ = writeln!(out, "### {title}\n");
    if trends.is_empty() {
        let _ = writeln!(out, "(none)\n");
        return;
    }
    for t in trends {
        let _ = writeln!(
            out,
            "- {}: {:.2} → {:.2} ({})",
            t.category,
            t.first,
            t.last,
            format_relative(t.relative)
        );
    }
    let _ = writeln!(out);
}

/// Writes the markdown summary of the run.
pub fn write_report<P: AsRef<Path>>(
    pivot: &Pivot,
    stats: &CoercionStats,
    top_n: usize,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let trends = category_trends(pivot);

    let mut out = String::new();
    let _ = writeln!(out, "# Sales trend report\n");
    if let (Some(first), Some(last)) = (pivot.months.first(), pivot.months.last()) {
        let _ = writeln!(out, "Months covered: {first} to {last} ({} months).", pivot.months.len());
    } else {
        let _ = writeln!(out, "Months covered: none.");
    }
    let _ = writeln!(
        out,
        "Rows read: {}; rows used: {}; dropped for bad dates: {}; dropped for bad amounts: {}; outside the requested range: {}.",
        stats.rows_read, stats.rows_kept, stats.bad_dates, stats.bad_amounts, stats.out_of_range
    );
    let _ = writeln!(
        out,
        "Pivot columns are ordered by total sales, descending; ties alphabetical. The chart shows the top {top_n} categories by the same ranking.\n"
    );

    let _ = writeln!(
        out,
        "Categories are classified by their first-to-last month change; moves within ±{:.0}% count as flat.\n",
        FLAT_THRESHOLD * 100.0
    );

    let growing: Vec<&CategoryTrend> = trends.iter().filter(|t| t.trend == Trend::Growing).collect();
    let declining: Vec<&CategoryTrend> =
        trends.iter().filter(|t| t.trend == Trend::Declining).collect();
    let flat: Vec<&CategoryTrend> = trends.iter().filter(|t| t.trend == Trend::Flat).collect();

    let _ = writeln!(out, "## Category movement\n");
    push_bucket(&mut out, "Growing", &growing);
    push_bucket(&mut out, "Declining", &declining);
    push_bucket(&mut out, "Flat", &flat);

    // Largest absolute moves, mirroring the bucket data from another angle.
    let mut by_delta: Vec<&CategoryTrend> = trends.iter().collect();
    by_delta.sort_by(|a, b| {
        (b.last - b.first)
            .total_cmp(&(a.last - a.first))
            .then_with(|| a.category.cmp(&b.category))
    });

    let _ = writeln!(out, "## Largest moves by amount\n");
    let _ = writeln!(out, "### Top gainers\n");
    for t in by_delta.iter().take(5).filter(|t| t.last > t.first) {
        let _ = writeln!(out, "- {}: +{:.2}", t.category, t.last - t.first);
    }
    let _ = writeln!(out, "\n### Top decliners\n");
    for t in by_delta.iter().rev().take(5).filter(|t| t.last < t.first) {
        let _ = writeln!(out, "- {}: {:.2}", t.category, t.last - t.first);
    }
    let _ = writeln!(out);

    std::fs::write(path, out)?;
    info!("wrote {}", path.display());
    Ok(())
}
