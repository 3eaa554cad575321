use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems with a transaction source. Any of these aborts the load
/// before a single KPI is computed.
#[derive(Error, Debug)]
pub enum DataFormatError {
    /// The source could not be opened or read from disk.
    #[error("Failed to read source {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one we know how to read.
    #[error("Unsupported source type: {0}")]
    UnsupportedSource(PathBuf),

    /// A delimited-text source is malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A workbook could not be decoded.
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// The requested worksheet does not exist, or the workbook has none.
    #[error("Worksheet not found: {0}")]
    WorksheetNotFound(String),

    /// The source has no header row or no data rows.
    #[error("Source is empty or has no data rows")]
    EmptySource,

    /// One or more required columns could not be matched to a header.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}
