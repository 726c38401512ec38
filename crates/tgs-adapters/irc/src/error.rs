//! IRC error types.

use thiserror::Error;
use tgs_core::ChatError;

/// Errors raised inside the IRC provider.
///
/// These never cross the provider contract as-is: connection failures are
/// logged and reported as `false` or a no-op, and a malformed connection
/// string becomes [`ChatError::InvalidConfig`].
#[derive(Debug, Error)]
pub enum IrcError {
    /// The connection string could not be parsed.
    #[error("invalid IRC connection string: {0}")]
    InvalidConnectionString(String),

    /// Socket failure.
    #[error("IRC I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake failure.
    #[error("IRC TLS error: {0}")]
    Tls(String),

    /// An inbound line exceeded the maximum length.
    #[error("IRC line too long")]
    LineTooLong,

    /// The server refused registration.
    #[error("IRC registration failed: {0}")]
    Registration(String),

    /// The server closed the connection.
    #[error("IRC connection closed")]
    Closed,
}

impl IrcError {
    /// Creates an invalid connection string error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConnectionString(msg.into())
    }
}

impl From<tokio_util::codec::LinesCodecError> for IrcError {
    fn from(e: tokio_util::codec::LinesCodecError) -> Self {
        match e {
            tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => Self::LineTooLong,
            tokio_util::codec::LinesCodecError::Io(e) => Self::Io(e),
        }
    }
}

impl From<IrcError> for ChatError {
    fn from(e: IrcError) -> Self {
        match e {
            IrcError::InvalidConnectionString(msg) => ChatError::InvalidConfig(msg),
            other => ChatError::Provider(other.to_string()),
        }
    }
}

/// Result type for IRC operations.
pub type IrcResult<T> = Result<T, IrcError>;
