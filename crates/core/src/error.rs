//! Error types for gd-core
//!
//! Provides a unified error type that carries an HTTP-style status code and
//! can be converted to the CLI's exit codes.

use thiserror::Error;

/// Result type alias for gd-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gd-core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed address: empty segments, unknown link shape, multi-parent chain
    #[error("Bad spec: {0}")]
    BadSpec(String),

    /// Id or link target does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure reported by the transport collaborator
    #[error("Transport error ({code}): {message}")]
    Transport { code: u16, message: String },

    /// A chunker that already reported exhaustion was driven again
    #[error("Chunker has already been exhausted")]
    ChunkerExhausted,

    /// A required cache entry was missing
    #[error("Failed to find {0} in cache")]
    CacheMiss(String),

    /// Node metadata unusable for caching
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(String),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::TomlParse(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::TomlSerialize(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl Error {
    /// Build a transport error from a status code and message
    pub fn transport(code: u16, message: impl Into<String>) -> Self {
        Error::Transport {
            code,
            message: message.into(),
        }
    }

    /// HTTP-style status code for this error
    pub const fn code(&self) -> u16 {
        match self {
            Error::BadSpec(_) | Error::InvalidUrl(_) => 400,
            Error::NotFound(_) => 404,
            Error::Transport { code, .. } => *code,
            _ => 500,
        }
    }

    /// Whether the remote store reported the target as missing
    pub const fn is_not_found(&self) -> bool {
        self.code() == 404
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::BadSpec(_) | Error::InvalidUrl(_) | Error::Config(_) => 2, // UsageError
            Error::NotFound(_) => 5,                                          // NotFound
            Error::Transport { code, .. } => match *code {
                401 | 403 => 4, // AuthError
                404 => 5,       // NotFound
                _ => 3,         // NetworkError
            },
            _ => 1, // GeneralError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::BadSpec("a//b".into()).code(), 400);
        assert_eq!(Error::NotFound("xyz".into()).code(), 404);
        assert_eq!(Error::transport(503, "unavailable").code(), 503);
        assert_eq!(Error::ChunkerExhausted.code(), 500);
        assert!(Error::transport(404, "gone").is_not_found());
        assert!(!Error::transport(500, "boom").is_not_found());
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::BadSpec("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::transport(404, "test").exit_code(), 5);
        assert_eq!(Error::transport(401, "test").exit_code(), 4);
        assert_eq!(Error::transport(403, "test").exit_code(), 4);
        assert_eq!(Error::transport(502, "test").exit_code(), 3);
        assert_eq!(Error::ChunkerExhausted.exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::BadSpec("Invalid filespec a//b".into());
        assert_eq!(err.to_string(), "Bad spec: Invalid filespec a//b");

        let err = Error::transport(429, "rate limited");
        assert_eq!(err.to_string(), "Transport error (429): rate limited");
    }
}
