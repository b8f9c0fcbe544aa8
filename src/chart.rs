use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::aggregate::Pivot;
use crate::error::{AnalysisError, Result};

const CHART_SIZE: (u32, u32) = (1024, 640);

fn chart_error<E>(err: E) -> AnalysisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AnalysisError::Other(anyhow::Error::new(err).context("failed to render trend chart"))
}

/// Renders one line per top-N category across the month axis into a PNG.
pub fn render_trend_chart<P: AsRef<Path>>(pivot: &Pivot, top_n: usize, path: P) -> Result<()> {
    let path = path.as_ref();
    let categories = pivot.top_categories(top_n);

    let mut y_min = 0.0f64;
    let mut y_max = 0.0f64;
    for row in &pivot.cells {
        for v in &row[..categories.len()] {
            y_min = y_min.min(*v);
            y_max = y_max.max(*v);
        }
    }
    if y_max == y_min {
        y_max = y_min + 1.0;
    }
    let y_pad = (y_max - y_min) * 0.05;
    let x_max = pivot.months.len().saturating_sub(1).max(1) as f64;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Sales trends by category (top {})", categories.len()),
            ("sans-serif", 28),
        )
        .margin(20)
        .x_label_area_size(48)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..x_max, (y_min - y_pad)..(y_max + y_pad))
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .x_labels(pivot.months.len().clamp(2, 12))
        .x_label_formatter(&|x| {
            let idx = x.round() as usize;
            pivot
                .months
                .get(idx)
                .map(|m| m.to_string())
                .unwrap_or_default()
        })
        .y_desc("sales amount")
        .x_desc("month")
        .draw()
        .map_err(chart_error)?;

    for (ci, category) in categories.iter().enumerate() {
        let color = Palette99::pick(ci);
        let points = (0..pivot.months.len()).map(|mi| (mi as f64, pivot.value(mi, ci)));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(chart_error)?
            .label(category.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    info!("wrote {}", path.display());
    Ok(())
}
