use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV must have a header row and at least one data row")]
    MissingRows,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
