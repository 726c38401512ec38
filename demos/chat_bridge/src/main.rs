//! Chat Bridge Example
//!
//! Connects the chat networks configured in `tgs.toml`, answers the
//! built-in commands and routes custom commands to a logging handler.
//!
//! # Commands
//!
//! ```text
//! !tgs                 - Hi!
//! !tgs help            - command list
//! !tgs version         - built-in
//! !tgs uptime          - built-in, defined below
//! !tgs announce <text> - built-in, admin channels only
//! !tgs ping            - custom, answered by the handler
//! !tgs kick <name>     - custom, admin channels only
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package chat-bridge -- --config demos/chat_bridge/tgs.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tgs::prelude::*;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Bridge game-server administration into chat")]
struct Args {
    /// Configuration file (defaults to tgs.toml in the current directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production".
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Custom Commands
// ============================================================================

/// Answers custom commands by logging them.
struct LoggingCommandHandler;

#[async_trait]
impl CustomCommandHandler for LoggingCommandHandler {
    async fn handle_chat_command(
        &self,
        name: &str,
        arguments: &str,
        user: &ChatUser,
        _cancel: &CancellationToken,
    ) -> ChatResult<Option<String>> {
        info!(
            command = name,
            arguments,
            user = %user.friendly_name,
            channel = %user.channel.friendly_name,
            tag = ?user.channel.tag,
            "Custom command"
        );
        match name {
            "PING" => Ok(Some("Pong!".to_owned())),
            "KICK" if arguments.is_empty() => Err(ChatError::command("Usage: kick <name>")),
            "KICK" => Ok(Some(format!("{arguments} would have been kicked"))),
            _ => Ok(None),
        }
    }
}

/// Logs every channel list update.
struct LoggingChannelSink;

#[async_trait]
impl ChannelSink for LoggingChannelSink {
    async fn update_channels(
        &self,
        channels: Vec<ChannelRepresentation>,
        _cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let names: Vec<&str> = channels.iter().map(|c| c.friendly_name.as_str()).collect();
        info!(count = channels.len(), ?names, "Channel list updated");
        Ok(())
    }
}

fn builtin_commands(started: Instant) -> BuiltinCommandFactory {
    BuiltinCommandFactory::new()
        .with_command(FnCommand::new(
            "UPTIME",
            "Shows how long the bridge has been running",
            move |_: CommandInvocation| async move {
                Ok(Some(format!("Up for {}s", started.elapsed().as_secs())))
            },
        ))
        .with_command(
            FnCommand::new(
                "ANNOUNCE",
                "Echoes the arguments back to the channel",
                |invocation: CommandInvocation| async move {
                    if invocation.arguments.is_empty() {
                        return Err(ChatError::command("Nothing to announce"));
                    }
                    Ok(Some(format!(
                        "{} announces: {}",
                        invocation.user.friendly_name, invocation.arguments
                    )))
                },
            )
            .admin_only(),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ChatRuntime::builder().command_factory(builtin_commands(Instant::now()));
    if let Some(config) = &args.config {
        builder = builder.config_file(config);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    runtime.register_command_handler(Arc::new(LoggingCommandHandler))?;
    let tracking = runtime.create_tracking_context()?;
    tracking.set_custom_commands(vec![
        CustomCommandSpec::new("PING", "Checks the custom command handler"),
        CustomCommandSpec::new("KICK", "Kicks a player from the server").admin_only(),
    ]);
    tracking
        .set_channel_sink(Arc::new(LoggingChannelSink), &CancellationToken::new())
        .await?;

    runtime
        .run_until(async {
            let cancel = CancellationToken::new();
            if let Err(e) = runtime
                .manager()
                .send_watchdog_message("Chat bridge online", &cancel)
                .await
            {
                warn!(error = %e, "Failed to announce startup");
            }

            info!("Chat bridge is now running. Press Ctrl+C to stop.");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Unable to listen for Ctrl+C");
            }
        })
        .await?;

    drop(tracking);
    Ok(())
}
