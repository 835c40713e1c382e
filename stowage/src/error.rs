use thiserror::Error;

/// Result type for drive storage operations.
pub type Result<T> = std::result::Result<T, StowageError>;

/// Errors that can occur in the drive storage adapter.
#[derive(Debug, Error)]
pub enum StowageError {
    /// Fatal misconfiguration (unreadable signing key, bad client setup).
    /// Surfaced immediately, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Signing a claim token failed.
    #[error("Token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The remote service answered outside the drive protocol, e.g. an
    /// upload response without an `id` field. Carries the raw body for
    /// diagnosis.
    #[error("Drive protocol error: {body}")]
    Protocol { body: String },

    /// Network-level failure: timeouts, connection resets, bad URLs.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading a local file for upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read was requested for a file that has no remote content.
    #[error("No remote content for file: {0}")]
    NoContent(String),

    /// The ledger store reported a failure.
    #[error("Ledger error: {0}")]
    Ledger(String),
}
