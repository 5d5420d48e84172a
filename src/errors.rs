use thiserror::Error;

/// Error taxonomy for a pipeline run.
///
/// Fetch-side failures (`AuthError`, `ReportError`, `HttpError`) are fatal
/// and abort the run before any output is written. Catalogue and column
/// problems are handled upstream by degraded modes and only reach this enum
/// when no usable fallback exists.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Report '{report}' failed: {detail}")]
    ReportError { report: String, detail: String },

    #[error("Unexpected payload from report '{report}': {detail}")]
    UnexpectedPayload { report: String, detail: String },

    #[error("HTTP transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("No inventory history day could be fetched")]
    EmptyHistory,

    #[error("Catalogue error: {0}")]
    CatalogueError(String),

    #[error("Workbook error: {0}")]
    WorkbookError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<rust_xlsxwriter::XlsxError> for ServiceError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ServiceError::WorkbookError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ConfigError(err.to_string())
    }
}
