//! Channel, user and message value types.
//!
//! A [`ChannelRepresentation`] is produced by a provider with a
//! provider-local `real_id`; the orchestrator rewrites `real_id` to the
//! synthetic id it assigns, so code downstream of the orchestrator only ever
//! sees synthetic ids.

use serde::{Deserialize, Serialize};

/// Synthetic or provider-local channel identifier.
pub type ChannelId = u64;

/// Externally assigned identifier of a chat connection.
pub type ConnectionId = i64;

/// A chat channel as seen by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRepresentation {
    /// Channel id. Provider-local until the orchestrator maps it.
    pub real_id: ChannelId,
    /// Display name of the network the channel lives on.
    pub connection_name: String,
    /// Display name of the channel.
    pub friendly_name: String,
    /// Whether admin-only commands may be used here.
    pub is_admin_channel: bool,
    /// Whether this is a one-to-one conversation.
    pub is_private_channel: bool,
    /// Opaque tag copied from the channel settings.
    pub tag: Option<String>,
}

/// The sender of a [`Message`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    /// Display name of the user.
    pub friendly_name: String,
    /// Token that mentions the user on its network.
    pub mention: String,
    /// Provider-assigned user id.
    pub real_id: u64,
    /// The channel the user spoke in.
    pub channel: ChannelRepresentation,
}

/// An inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Text content.
    pub content: String,
    /// Who sent it, and where.
    pub user: ChatUser,
}

impl Message {
    /// Creates a message.
    pub fn new(content: impl Into<String>, user: ChatUser) -> Self {
        Self {
            content: content.into(),
            user,
        }
    }

    /// Returns the channel the message arrived on.
    pub fn channel(&self) -> &ChannelRepresentation {
        &self.user.channel
    }
}
