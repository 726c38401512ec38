//! The chat provider contract.
//!
//! A [`Provider`] is one chat-network connection. Each wire protocol is a
//! separate implementation of this trait; the orchestrator only ever talks
//! to the trait, so handshake and authentication state never leak out of
//! the provider.
//!
//! # Failure model
//!
//! Connectivity failures are the provider's problem: they are logged where
//! they happen and surfaced as `false` from [`Provider::connect`] or as a
//! no-op from [`Provider::send_message`]. The only error every operation
//! may return is [`ChatError::Cancelled`](crate::ChatError::Cancelled).
//!
//! # Receiving
//!
//! ```rust,ignore
//! loop {
//!     match provider.next_message(&cancel).await? {
//!         ProviderEvent::Message(message) => handle(message).await,
//!         ProviderEvent::Reconnected => remap(&provider).await?,
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelId, ChannelRepresentation, Message};
use crate::error::ChatResult;
use crate::settings::{ChatBotSettings, ChatChannelSettings};

/// Result of [`Provider::next_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// An inbound message.
    Message(Message),
    /// The connection dropped and was re-established; channels must be
    /// remapped.
    Reconnected,
}

/// One chat-network connection.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Whether the connection is currently up.
    fn connected(&self) -> bool;

    /// Token users type to address the bot on this network.
    fn bot_mention(&self) -> String;

    /// Establishes the connection.
    ///
    /// Returns `Ok(false)` on any failure other than cancellation.
    async fn connect(&self, cancel: &CancellationToken) -> ChatResult<bool>;

    /// Tears the connection down. Best-effort.
    async fn disconnect(&self, cancel: &CancellationToken) -> ChatResult<()>;

    /// Joins `channels` and returns one representation per input channel, in
    /// input order, carrying provider-local ids.
    ///
    /// Ids of channels that are already joined are reused. Previously joined
    /// channels missing from `channels` are left. Fails with
    /// [`ChatError::InvalidConfig`](crate::ChatError::InvalidConfig) if a
    /// channel lacks the addressing data this protocol needs.
    async fn map_channels(
        &self,
        channels: &[ChatChannelSettings],
        cancel: &CancellationToken,
    ) -> ChatResult<Vec<ChannelRepresentation>>;

    /// Sends `text` to a provider-local channel. Failures are logged, not
    /// returned.
    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
        cancel: &CancellationToken,
    ) -> ChatResult<()>;

    /// Waits for the next inbound message or a reconnect notice.
    ///
    /// Dropping the returned future must not lose a message. At most one
    /// call is outstanding at a time.
    async fn next_message(&self, cancel: &CancellationToken) -> ChatResult<ProviderEvent>;

    /// Changes the delay, in minutes, between reconnection attempts.
    fn set_reconnect_interval(&self, minutes: u32);
}

/// A shared provider trait object.
pub type BoxedProvider = Arc<dyn Provider>;

/// Builds providers from connection settings.
pub trait ProviderFactory: Send + Sync + 'static {
    /// Creates a disconnected provider for `settings`.
    fn create_provider(&self, settings: &ChatBotSettings) -> ChatResult<BoxedProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&ChatBotSettings) -> ChatResult<BoxedProvider> + Send + Sync + 'static,
{
    fn create_provider(&self, settings: &ChatBotSettings) -> ChatResult<BoxedProvider> {
        self(settings)
    }
}
