//! Connection and channel settings.
//!
//! These are the records the surrounding instance configuration hands to the
//! orchestrator. They are immutable value inputs: the orchestrator keeps a
//! copy of the latest record per connection and never persists anything.

use serde::{Deserialize, Serialize};

use crate::channel::ConnectionId;

/// The chat network a connection talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ChatProviderKind {
    /// Internet relay chat.
    #[default]
    Irc,
}

impl ChatProviderKind {
    /// Returns the kind as a configuration string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Irc => "irc",
        }
    }
}

impl std::fmt::Display for ChatProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of one chat connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBotSettings {
    /// Stable connection id.
    pub id: ConnectionId,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Whether the connection should be live.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Which network the connection string is for.
    #[serde(default)]
    pub provider: ChatProviderKind,

    /// Provider-specific connection parameters.
    pub connection_string: String,

    /// Minutes between reconnection attempts.
    #[serde(default = "default_reconnection_interval")]
    pub reconnection_interval: u32,

    /// Ordered channel list.
    #[serde(default)]
    pub channels: Vec<ChatChannelSettings>,
}

fn default_enabled() -> bool {
    true
}

fn default_reconnection_interval() -> u32 {
    1
}

impl ChatBotSettings {
    /// Creates enabled settings with no channels.
    pub fn new(
        id: ConnectionId,
        provider: ChatProviderKind,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: format!("connection-{id}"),
            enabled: true,
            provider,
            connection_string: connection_string.into(),
            reconnection_interval: default_reconnection_interval(),
            channels: Vec::new(),
        }
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the channel list.
    pub fn with_channels(mut self, channels: Vec<ChatChannelSettings>) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the reconnection interval in minutes.
    pub fn with_reconnection_interval(mut self, minutes: u32) -> Self {
        self.reconnection_interval = minutes;
        self
    }

    /// Returns `true` if a provider built from `self` can keep serving
    /// `other`, i.e. the raw connection parameters are identical.
    pub fn same_connection(&self, other: &Self) -> bool {
        self.provider == other.provider && self.connection_string == other.connection_string
    }
}

/// Settings of one channel of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatChannelSettings {
    /// IRC channel, optionally followed by `;key`.
    pub irc_channel: Option<String>,
    /// Admin-only commands are allowed here.
    pub is_admin_channel: bool,
    /// Receives process supervision notices.
    pub is_watchdog_channel: bool,
    /// Receives update notices.
    pub is_updates_channel: bool,
    /// Opaque tag handed back to custom command suppliers.
    pub tag: Option<String>,
}

impl ChatChannelSettings {
    /// Creates settings for an IRC channel.
    pub fn irc(channel: impl Into<String>) -> Self {
        Self {
            irc_channel: Some(channel.into()),
            ..Default::default()
        }
    }

    /// Marks the channel as an admin channel.
    pub fn admin(mut self) -> Self {
        self.is_admin_channel = true;
        self
    }

    /// Marks the channel as a watchdog channel.
    pub fn watchdog(mut self) -> Self {
        self.is_watchdog_channel = true;
        self
    }

    /// Marks the channel as an updates channel.
    pub fn updates(mut self) -> Self {
        self.is_updates_channel = true;
        self
    }

    /// Sets the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The IRC channel name without its key.
    pub fn irc_channel_name(&self) -> Option<&str> {
        self.irc_channel
            .as_deref()
            .map(|raw| raw.split_once(';').map_or(raw, |(name, _)| name))
    }

    /// The IRC channel key, if one follows the name.
    pub fn irc_channel_key(&self) -> Option<&str> {
        self.irc_channel
            .as_deref()
            .and_then(|raw| raw.split_once(';'))
            .map(|(_, key)| key)
            .filter(|key| !key.is_empty())
    }
}
