use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use time::Date;
use tracing::debug;

use crate::error::{AnalysisError, Result};

/// A single cell after loading, before column detection and coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(Date),
}

/// Raw tabular data straight out of the input file. Untrusted: headers are
/// whatever the source used and cells may hold anything.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Excel serial 0 corresponds to 1899-12-30 (Julian day 2415019), which
/// absorbs the fictitious 1900-02-29 for every serial past February 1900.
const EXCEL_EPOCH_JULIAN_DAY: i32 = 2415019;

pub(crate) fn excel_serial_to_date(serial: f64) -> Option<Date> {
    let days = serial.floor() as i32;
    if days <= 60 {
        // Ambiguous pre-bug serials never occur in the ledgers this tool
        // targets, so reject them instead of guessing.
        return None;
    }
    Date::from_julian_day(EXCEL_EPOCH_JULIAN_DAY + days).ok()
}

/// Reads a workbook or CSV file into a [`RawTable`].
///
/// `sheet` selects a worksheet by name; the first sheet is used when absent.
/// CSV inputs ignore `sheet`.
pub fn load_table<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<RawTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AnalysisError::InputNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = if ext == "csv" {
        load_csv(path)?
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        load_workbook(path, sheet)?
    } else {
        return Err(AnalysisError::UnsupportedFormat(path.to_path_buf()));
    };

    debug!(
        rows = table.rows.len(),
        columns = table.headers.len(),
        "loaded input table"
    );
    Ok(table)
}

fn load_csv(path: &Path) -> Result<RawTable> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                let field = field.trim();
                if field.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|source| AnalysisError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(AnalysisError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| AnalysisError::Workbook {
                path: path.to_path_buf(),
                source: calamine::Error::Msg("workbook contains no sheets"),
            })?,
    };

    // The sheet exists at this point, so any failure here is a parse
    // problem inside the workbook, not a bad sheet name.
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| AnalysisError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

    let mut row_iter = range.rows();
    let headers = row_iter
        .next()
        .map(|r| {
            r.iter()
                .map(|c| c.as_string().unwrap_or_default().trim().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let rows = row_iter
        .map(|r| r.iter().map(convert_cell).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => Cell::Date(date),
            None => Cell::Empty,
        },
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            let s = s.trim();
            if s.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.to_string())
            }
        }
        Data::Error(_) => Cell::Empty,
    }
}
