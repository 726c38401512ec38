//! Command abstractions.
//!
//! Two populations of commands exist. Built-in commands implement
//! [`Command`] directly and are produced once by a [`CommandFactory`].
//! Custom commands are supplied at runtime by an external collaborator and
//! invoked through its [`CustomCommandHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::channel::ChatUser;
use crate::error::ChatResult;

/// A chat command.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Command name. Matched case-insensitively.
    fn name(&self) -> &str;

    /// One-line help text.
    fn help_text(&self) -> &str;

    /// Whether the command may only be used in admin channels.
    fn admin_only(&self) -> bool {
        false
    }

    /// Runs the command. `Ok(Some(text))` with non-empty text is sent back
    /// to the channel.
    async fn invoke(
        &self,
        arguments: &str,
        user: &ChatUser,
        cancel: &CancellationToken,
    ) -> ChatResult<Option<String>>;
}

/// A shared command trait object.
pub type BoxedCommand = Arc<dyn Command>;

/// Produces the built-in command set.
pub trait CommandFactory: Send + Sync + 'static {
    /// Returns every built-in command.
    fn generate_commands(&self) -> Vec<BoxedCommand>;
}

/// Executes custom commands on behalf of their supplier.
#[async_trait]
pub trait CustomCommandHandler: Send + Sync + 'static {
    /// Runs the custom command `name`.
    async fn handle_chat_command(
        &self,
        name: &str,
        arguments: &str,
        user: &ChatUser,
        cancel: &CancellationToken,
    ) -> ChatResult<Option<String>>;
}
