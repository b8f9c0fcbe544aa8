use std::path::Path;

use tracing::info;

use crate::aggregate::{ChangeMatrix, MonthlyTotal, Pivot};
use crate::error::Result;

/// Long-form aggregate table: one row per (month, category).
pub fn write_aggregated_csv<P: AsRef<Path>>(totals: &[MonthlyTotal], path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["month", "category", "total_amount", "total_quantity", "orders"])?;
    for t in totals {
        wtr.write_record(&[
            t.month.to_string(),
            t.category.clone(),
            t.total_amount.to_string(),
            t.total_quantity.to_string(),
            t.orders.to_string(),
        ])?;
    }
    wtr.flush()?;
    info!("wrote {}", path.as_ref().display());
    Ok(())
}

/// Pivot matrix: month rows, category columns.
pub fn write_pivot_csv<P: AsRef<Path>>(pivot: &Pivot, path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(&path)?;
    let mut header = vec!["month".to_string()];
    header.extend(pivot.categories.iter().cloned());
    wtr.write_record(&header)?;
    for (mi, month) in pivot.months.iter().enumerate() {
        let mut record = vec![month.to_string()];
        record.extend(pivot.cells[mi].iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!("wrote {}", path.as_ref().display());
    Ok(())
}

/// Month-over-month change matrix; undefined cells are left empty.
pub fn write_change_csv<P: AsRef<Path>>(change: &ChangeMatrix, path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(&path)?;
    let mut header = vec!["month".to_string()];
    header.extend(change.categories.iter().cloned());
    wtr.write_record(&header)?;
    for (mi, month) in change.months.iter().enumerate() {
        let mut record = vec![month.to_string()];
        record.extend(
            change.cells[mi]
                .iter()
                .map(|v| v.map(|p| p.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!("wrote {}", path.as_ref().display());
    Ok(())
}
