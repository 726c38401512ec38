//! # TGS
//!
//! Chat bridge for game-server administration.
//!
//! ## Overview
//!
//! Any number of chat connections, each on its own network, are merged into
//! one stream of addressed messages. Every message is answered from a command
//! language shared by all networks:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────────┐     ┌──────────────────┐
//! │ IRC provider │────▶│                          │────▶│ built-in commands│
//! │ IRC provider │────▶│ ChatManager (merge loop) │────▶│ custom commands  │──▶ handler
//! │ ...          │────▶│                          │     └──────────────────┘
//! └──────────────┘     └──────────────────────────┘
//! ```
//!
//! - **Providers**: one connection each; reconnect on their own
//! - **ChatManager**: channel identity table, topology changes, broadcasts
//! - **Commands**: `!tgs <command> [args]`, or the bare command in a private message
//! - **Tracking contexts**: live channel views for a custom command supplier
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tgs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ChatRuntime::builder().build()?;
//!     runtime.register_command_handler(Arc::new(MyHandler))?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `irc` (default): IRC provider
//! - `tls` (default): TLS for IRC
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use tgs_chat as chat;
pub use tgs_core as core;
#[cfg(feature = "irc")]
pub use tgs_irc as irc;
pub use tgs_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tgs::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use tgs_runtime::{ChatRuntime, TgsConfig};

    // Orchestrator and command building blocks
    pub use tgs_chat::{
        BuiltinCommandFactory, ChannelSink, ChatManager, ChatTrackingContext, CommandInvocation,
        CustomCommandSpec, FnCommand,
    };

    // Contracts for custom implementations
    pub use tgs_core::{
        CancellationToken, ChannelRepresentation, ChatBotSettings, ChatChannelSettings,
        ChatError, ChatProviderKind, ChatResult, ChatUser, Command, CustomCommandHandler,
        Provider, ProviderFactory, RestartHandler, async_trait,
    };
}
