//! Error types and result aliases.
//!
//! Defines the core `RelayError` enumeration and common `Result` type.

use thiserror::Error;

/// Startup-time errors.
///
/// The rewriting core itself is infallible: anything it cannot classify is
/// passed through untouched. Only configuration and allow-list loading can
/// fail, and only before the first exchange is served.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An allow-list rule failed to compile.
    #[error("invalid allow-list pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The allow-list file could not be read.
    #[error("allow-list error: {0}")]
    AllowList(String),
}

/// Result type alias for `RelayError`.
pub type Result<T> = std::result::Result<T, RelayError>;
