use std::path::PathBuf;

use thiserror::Error;

/// All fatal errors produced by the analysis pipeline.
///
/// Per-row numeric coercion problems are not represented here; they are
/// counted in [`crate::columns::CoercionStats`] and logged as warnings.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The input path does not exist.
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    /// The input extension is not a supported spreadsheet or CSV format.
    #[error("unsupported input format: {0} (expected xlsx, xlsm, xlsb, xls, ods or csv)")]
    UnsupportedFormat(PathBuf),

    /// The file exists but could not be read as a workbook.
    #[error("failed to read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// The requested worksheet is not present in the workbook.
    #[error("worksheet not found: {0}")]
    SheetNotFound(String),

    /// No header matched a required canonical field.
    #[error("no {field} column could be detected among the input headers")]
    ColumnDetection { field: &'static str },

    /// Every row was dropped during coercion or date filtering.
    #[error("no rows with usable date and amount values remain after cleaning")]
    NoData,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
