//! Error types for the session layer.

/// Errors raised while establishing who the caller is.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No API token was supplied.
    #[error("no API token provided")]
    MissingToken,

    /// The service rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The account profile could not be fetched or read.
    #[error("account profile unavailable: {0}")]
    ProfileUnavailable(String),
}
