//! Tracking contexts.
//!
//! A [`ChatTrackingContext`] is handed to one external command supplier. It
//! exposes the live channel list and carries that supplier's current custom
//! command set, which the dispatcher reads at dispatch time. Dropping the
//! context unregisters it from the manager that issued it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tgs_core::{
    BoxedCommand, CancellationToken, ChannelRepresentation, ChatResult, ChatUser, Command,
    CustomCommandHandler,
};
use tracing::{trace, warn};

/// Description of a custom command offered by a supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCommandSpec {
    pub name: String,
    pub help_text: String,
    pub admin_only: bool,
}

impl CustomCommandSpec {
    pub fn new(name: impl Into<String>, help_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help_text: help_text.into(),
            admin_only: false,
        }
    }

    /// Restricts the command to admin channels.
    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }
}

/// Receives channel list updates.
#[async_trait]
pub trait ChannelSink: Send + Sync + 'static {
    /// Called with the full channel list after every change.
    async fn update_channels(
        &self,
        channels: Vec<ChannelRepresentation>,
        cancel: &CancellationToken,
    ) -> ChatResult<()>;
}

/// A custom command bound to the handler that executes it.
struct CustomCommand {
    spec: CustomCommandSpec,
    handler: Arc<dyn CustomCommandHandler>,
}

#[async_trait]
impl Command for CustomCommand {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn help_text(&self) -> &str {
        &self.spec.help_text
    }

    fn admin_only(&self) -> bool {
        self.spec.admin_only
    }

    async fn invoke(
        &self,
        arguments: &str,
        user: &ChatUser,
        cancel: &CancellationToken,
    ) -> ChatResult<Option<String>> {
        self.handler
            .handle_chat_command(&self.spec.name, arguments, user, cancel)
            .await
    }
}

/// State shared between a context handle and the manager's registry.
///
/// A context is identified by this allocation, so identities never leak
/// between managers.
pub(crate) struct TrackingShared {
    handler: Arc<dyn CustomCommandHandler>,
    channels: RwLock<Vec<ChannelRepresentation>>,
    custom_commands: RwLock<Vec<BoxedCommand>>,
    sink: Mutex<Option<Arc<dyn ChannelSink>>>,
}

impl TrackingShared {
    pub(crate) fn new(
        handler: Arc<dyn CustomCommandHandler>,
        channels: Vec<ChannelRepresentation>,
    ) -> Self {
        Self {
            handler,
            channels: RwLock::new(channels),
            custom_commands: RwLock::new(Vec::new()),
            sink: Mutex::new(None),
        }
    }

    /// Snapshot of the current custom commands.
    pub(crate) fn custom_commands(&self) -> Vec<BoxedCommand> {
        self.custom_commands.read().clone()
    }

    /// Stores `channels` and returns the sink notification to await once
    /// every lock is released.
    pub(crate) fn update_channels(
        &self,
        channels: Vec<ChannelRepresentation>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ChatResult<()>> {
        *self.channels.write() = channels.clone();
        let sink = self.sink.lock().clone();
        Box::pin(async move {
            let Some(sink) = sink else {
                return Ok(());
            };
            trace!(count = channels.len(), "Publishing channel update");
            match sink.update_channels(channels, &cancel).await {
                Err(e) if !e.is_cancelled() => {
                    warn!(error = %e, "Channel sink rejected update");
                    Ok(())
                }
                other => other,
            }
        })
    }
}

type ReleaseFn = Box<dyn FnOnce(&Arc<TrackingShared>) + Send + Sync>;

/// A live, revocable view issued by
/// [`ChatManager::create_tracking_context`](crate::ChatManager::create_tracking_context).
pub struct ChatTrackingContext {
    shared: Arc<TrackingShared>,
    release: Option<ReleaseFn>,
}

impl ChatTrackingContext {
    pub(crate) fn new(shared: Arc<TrackingShared>, release: ReleaseFn) -> Self {
        Self {
            shared,
            release: Some(release),
        }
    }

    /// The current channel list.
    pub fn channels(&self) -> Vec<ChannelRepresentation> {
        self.shared.channels.read().clone()
    }

    /// Replaces this supplier's custom commands.
    pub fn set_custom_commands(&self, commands: Vec<CustomCommandSpec>) {
        let commands = commands
            .into_iter()
            .map(|spec| {
                Arc::new(CustomCommand {
                    spec,
                    handler: self.shared.handler.clone(),
                }) as BoxedCommand
            })
            .collect();
        *self.shared.custom_commands.write() = commands;
    }

    /// Names of the current custom commands.
    pub fn custom_command_names(&self) -> Vec<String> {
        self.shared
            .custom_commands
            .read()
            .iter()
            .map(|c| c.name().to_owned())
            .collect()
    }

    /// Installs a sink and immediately feeds it the current channel list.
    pub async fn set_channel_sink(
        &self,
        sink: Arc<dyn ChannelSink>,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        *self.shared.sink.lock() = Some(sink.clone());
        sink.update_channels(self.channels(), cancel).await
    }
}

impl Drop for ChatTrackingContext {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(&self.shared);
        }
    }
}

impl std::fmt::Debug for ChatTrackingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTrackingContext")
            .field("channels", &self.shared.channels.read().len())
            .field("custom_commands", &self.shared.custom_commands.read().len())
            .finish()
    }
}
