//! Error types for the folio host.

/// Top-level error type for the folio service and CLI.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    /// Configuration error (unreadable file, invalid TOML, invalid values).
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error surfaced by the metadata aggregation core.
    #[error("metadata error: {0}")]
    Metadata(#[from] folio_metadata::MetadataError),

    /// HTTP server error (bind failure, address lookup).
    #[error("server error: {0}")]
    Server(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, FolioError>;
