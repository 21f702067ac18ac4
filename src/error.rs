//! Error type shared by the loaders, aggregations and views

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
