use thiserror::Error;

/// Infrastructure failures — IO, parsing, artifact writing, remote calls.
///
/// Business-level degradation (a malformed attribute, a file that does not
/// look like a CFDI) never surfaces here; it flows through the run's
/// [`IssueTracker`](crate::core::IssueTracker) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComprobanteError {
    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing or document structure error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Spreadsheet generation error.
    #[cfg(feature = "reportes")]
    #[error("report error: {0}")]
    Reporte(#[from] rust_xlsxwriter::XlsxError),

    /// ZIP archive assembly error.
    #[cfg(feature = "clasificador")]
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// SAT status-lookup transport error.
    #[cfg(feature = "validacion")]
    #[error("SAT query error: {0}")]
    Consulta(String),
}
