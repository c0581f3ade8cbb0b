//! Error types for ingestion and chart building
//!
//! Every failure a user can trigger (bad upload, unknown column, unsupported
//! chart type) is a typed variant here so the web layer can report it with a
//! readable message instead of dropping the session.

use thiserror::Error;

/// Errors that can occur while ingesting an uploaded file
#[derive(Error, Debug)]
pub enum DataError {
    /// CSV parsing error
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be opened or a sheet could not be read
    #[error("Spreadsheet error: {0}")]
    Workbook(#[from] calamine::XlsxError),

    /// The declared media type is neither CSV nor XLSX
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// File contains no header row
    #[error("Empty file")]
    EmptyFile,

    /// Requested sheet does not exist in the workbook
    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    /// A record has more fields than the header
    #[error("Row {row} has {found} fields but the header has {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Result type alias for data operations
pub type DataResult<T> = Result<T, DataError>;

/// Errors that can occur while turning widget state into a chart
#[derive(Error, Debug, PartialEq)]
pub enum ChartError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Bars, Histogram and Pie are selectable but have no rendering path
    #[error("Chart type '{0}' is not supported yet; choose Line")]
    UnsupportedChartType(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Render error: {0}")]
    Render(String),
}

/// Result type alias for chart operations
pub type ChartResult<T> = Result<T, ChartError>;
