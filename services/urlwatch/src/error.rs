//! Error types for the urlwatch service

/// Errors that can occur in the urlwatch service
#[derive(Debug, thiserror::Error)]
pub enum UrlWatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Building the client, connecting, or the request itself failed
    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notifier error: {0}")]
    Notifier(String),
}

/// Result type alias for urlwatch operations
pub type Result<T> = std::result::Result<T, UrlWatchError>;
