use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: {captured} frames captured, at least {required} required")]
    InsufficientData { captured: usize, required: usize },

    #[error("Export to {} failed: {source}", path.display())]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Frame queue is full")]
    Backpressure,

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn export_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ExportFailed {
            path: path.into(),
            source,
        }
    }
}
