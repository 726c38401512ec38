//! Built-in commands.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tgs_core::{
    BoxedCommand, CancellationToken, ChatResult, ChatUser, Command, CommandFactory,
};

/// Arguments handed to an [`FnCommand`] closure.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub arguments: String,
    pub user: ChatUser,
    pub cancel: CancellationToken,
}

/// A [`Command`] backed by an async closure.
///
/// ```rust,ignore
/// let status = FnCommand::new("STATUS", "Shows server status", |_| async {
///     Ok(Some("Online".to_owned()))
/// });
/// ```
pub struct FnCommand<F> {
    name: String,
    help_text: String,
    admin_only: bool,
    func: F,
}

impl<F, Fut> FnCommand<F>
where
    F: Fn(CommandInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ChatResult<Option<String>>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, help_text: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            help_text: help_text.into(),
            admin_only: false,
            func,
        }
    }

    /// Restricts the command to admin channels.
    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }
}

#[async_trait]
impl<F, Fut> Command for FnCommand<F>
where
    F: Fn(CommandInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ChatResult<Option<String>>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn help_text(&self) -> &str {
        &self.help_text
    }

    fn admin_only(&self) -> bool {
        self.admin_only
    }

    async fn invoke(
        &self,
        arguments: &str,
        user: &ChatUser,
        cancel: &CancellationToken,
    ) -> ChatResult<Option<String>> {
        (self.func)(CommandInvocation {
            arguments: arguments.to_owned(),
            user: user.clone(),
            cancel: cancel.clone(),
        })
        .await
    }
}

/// Replies with the bridge version.
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    fn name(&self) -> &str {
        "VERSION"
    }

    fn help_text(&self) -> &str {
        "Displays the chat bridge version"
    }

    async fn invoke(
        &self,
        _arguments: &str,
        _user: &ChatUser,
        _cancel: &CancellationToken,
    ) -> ChatResult<Option<String>> {
        Ok(Some(format!("tgs-chat v{}", env!("CARGO_PKG_VERSION"))))
    }
}

/// The default [`CommandFactory`]: `VERSION` plus whatever was added.
#[derive(Default)]
pub struct BuiltinCommandFactory {
    extra: Vec<BoxedCommand>,
}

impl BuiltinCommandFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command to the built-in set.
    pub fn with_command(mut self, command: impl Command) -> Self {
        self.extra.push(Arc::new(command));
        self
    }
}

impl CommandFactory for BuiltinCommandFactory {
    fn generate_commands(&self) -> Vec<BoxedCommand> {
        let mut commands: Vec<BoxedCommand> = vec![Arc::new(VersionCommand)];
        commands.extend(self.extra.iter().cloned());
        commands
    }
}
