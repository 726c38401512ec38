//! # TGS Chat
//!
//! The chat bridge orchestrator.
//!
//! [`ChatManager`] multiplexes any number of independently connecting
//! [`Provider`](tgs_core::Provider)s into one message stream, keeps a
//! stable synthetic channel id space across reconnects and
//! reconfiguration, and dispatches the `!tgs` command language against
//! that stream.
//!
//! ```text
//!             ┌──────────── ChatManager ─────────────┐
//! Provider ──▶│ merge loop ──▶ ChannelTable ──▶ Dispatcher ──▶ reply
//! Provider ──▶│     ▲                              ▲  │
//! Provider ──▶│     └── topology signal            │  │
//!             │            tracking contexts ──────┘  │
//!             └───────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tgs_chat::{BuiltinCommandFactory, ChatManager};
//!
//! let manager = Arc::new(ChatManager::new(
//!     Arc::new(my_provider_factory),
//!     Arc::new(BuiltinCommandFactory::new()),
//!     bots,
//! ));
//! manager.register_command_handler(Arc::new(my_handler))?;
//! manager.start(&cancel).await?;
//! manager.send_watchdog_message("Server started", &cancel).await?;
//! manager.stop(&cancel).await?;
//! ```

pub mod builtin;
pub mod dispatch;
pub mod manager;
pub mod mapping;
pub mod tracking;

#[cfg(test)]
pub(crate) mod testing;

pub use builtin::{BuiltinCommandFactory, CommandInvocation, FnCommand, VersionCommand};
pub use dispatch::{COMMON_MENTION, CommandDispatcher, CommandLine, parse_command_line};
pub use manager::ChatManager;
pub use mapping::{ChannelIdCounter, ChannelMapping, ChannelTable};
pub use tracking::{ChannelSink, ChatTrackingContext, CustomCommandSpec};
