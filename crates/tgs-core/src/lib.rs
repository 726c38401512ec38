//! # TGS Core
//!
//! Shared contracts of the chat bridge.
//!
//! This crate holds everything the orchestrator and the protocol adapters
//! both need to agree on, and nothing else:
//!
//! - **Values**: [`ChannelRepresentation`], [`ChatUser`], [`Message`]
//! - **Settings**: [`ChatBotSettings`], [`ChatChannelSettings`], [`ChatProviderKind`]
//! - **Provider contract**: [`Provider`], [`ProviderEvent`], [`ProviderFactory`]
//! - **Commands**: [`Command`], [`CommandFactory`], [`CustomCommandHandler`]
//! - **Hooks**: [`RestartHandler`]
//! - **Primitives**: [`RenewableSignal`]
//! - **Errors**: [`ChatError`], [`ChatResult`]
//!
//! ```text
//! ┌──────────────┐   next_message   ┌─────────────┐   invoke   ┌─────────┐
//! │ Provider(s)  │─────────────────▶│ ChatManager │───────────▶│ Command │
//! │  (tgs-irc)   │◀─────────────────│ (tgs-chat)  │◀───────────│         │
//! └──────────────┘   send_message   └─────────────┘    reply   └─────────┘
//! ```

pub mod channel;
pub mod command;
pub mod error;
pub mod provider;
pub mod restart;
pub mod settings;
pub mod signal;

pub use channel::{ChannelId, ChannelRepresentation, ChatUser, ConnectionId, Message};
pub use command::{BoxedCommand, Command, CommandFactory, CustomCommandHandler};
pub use error::{ChatError, ChatResult};
pub use provider::{BoxedProvider, Provider, ProviderEvent, ProviderFactory};
pub use restart::RestartHandler;
pub use settings::{ChatBotSettings, ChatChannelSettings, ChatProviderKind};
pub use signal::{RenewableSignal, SignalListener};

// Re-exported so implementors do not need a direct dependency.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
