//! Unified error types for the chat bridge.
//!
//! Every fallible operation of the provider contract, the command system and
//! the orchestrator returns a [`ChatResult`]. The variants mirror the error
//! taxonomy the orchestrator relies on:
//!
//! | Variant | Raised by | Handling |
//! |---|---|---|
//! | [`Cancelled`](ChatError::Cancelled) | any suspension point | clean, logged stop |
//! | [`InvalidConfig`](ChatError::InvalidConfig) | settings / channel mapping | fails the requesting call |
//! | [`InvalidOperation`](ChatError::InvalidOperation) | contract violations | fails the calling operation |
//! | [`Command`](ChatError::Command) | command invocations | reported into the channel |
//! | [`Provider`](ChatError::Provider) | connectivity | logged by the provider |

use thiserror::Error;

/// Errors that can occur in chat operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The operation was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// A setting or channel is missing data its provider requires.
    #[error("invalid chat configuration: {0}")]
    InvalidConfig(String),

    /// The caller broke the usage contract (e.g. registering twice).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A command invocation failed.
    #[error("command failed: {0}")]
    Command(String),

    /// A provider failed to talk to its network.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ChatError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Creates a command failure.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Creates a provider failure.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Returns `true` for [`ChatError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
