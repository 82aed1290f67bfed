//! Error types for slide capture

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while discovering, resolving or capturing slides
#[derive(Error, Debug)]
pub enum Error {
    /// Input directory missing, unreadable, or without documents
    #[error("Document discovery failed: {0}")]
    DiscoveryError(String),

    /// Failed to start the rendering backend
    #[error("Surface initialization failed: {0}")]
    InitializationError(String),

    /// Failed to open a document
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// Selector was malformed or the query threw
    #[error("Query failed: {0}")]
    QueryError(String),

    /// The inspection probe returned an unusable value
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Failed to rasterize an element
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short name of the processing stage this error belongs to, used in logs
    /// and batch reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::DiscoveryError(_) => "discovery",
            Error::InitializationError(_) => "init",
            Error::LoadError(_) => "load",
            Error::QueryError(_) | Error::ScriptError(_) => "query",
            Error::CaptureError(_) => "capture",
            Error::ConfigError(_) => "config",
            Error::Io(_) => "io",
            #[cfg(feature = "cdp")]
            Error::CdpError(_) => "cdp",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
