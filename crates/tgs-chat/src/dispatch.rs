//! Command dispatch engine.
//!
//! Turns one inbound [`Message`] into at most one reply:
//!
//! 1. [`parse_command_line`] decides whether the message is addressed to
//!    the bot and splits it into a command name and argument text.
//! 2. [`CommandDispatcher::dispatch`] resolves the name against the
//!    built-in commands first, then against the custom commands currently
//!    exposed by the live tracking contexts, and invokes the match.
//!
//! Custom commands are looked up in the order the caller supplies them.
//! When two tracking contexts expose the same name, whichever comes first
//! wins; no tie-break beyond that order is applied.

use tgs_core::{BoxedCommand, CancellationToken, ChatResult, Message};
use tracing::{error, trace};

/// Mention that addresses the bot on every network.
pub const COMMON_MENTION: &str = "!tgs";

/// Reply to a bare mention.
pub const GREETING: &str = "Hi!";

/// Reply when no command matches.
pub const UNKNOWN_COMMAND: &str = "Unknown command! Type '?' or 'help' for available commands.";

/// Reply when an admin-only command is used outside an admin channel.
pub const ADMIN_ONLY_REJECTION: &str = "Use this command in an admin channel!";

/// Reply when a command fails.
pub const INTERNAL_ERROR: &str = "Internal error processing command!";

const HELP_PREFIX: &str =
    "Available commands (Type '?' or 'help' and then a command name for more details): ";

const ADMIN_ONLY_SUFFIX: &str = " - May only be used in admin channels";

/// The parsed shape of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Not addressed to the bot.
    Ignored,
    /// Addressed, with nothing after the mention.
    Greeting,
    /// `help` or `?`, optionally followed by a command name.
    Help { topic: Option<String> },
    /// A command invocation. `name` is uppercased.
    Invoke { name: String, arguments: String },
}

/// Parses message text.
///
/// `bot_mention` is the provider-specific mention token. Unaddressed text
/// in a private channel is still treated as a command.
pub fn parse_command_line(content: &str, bot_mention: &str, is_private: bool) -> CommandLine {
    let mut tokens: Vec<&str> = content.trim().split(' ').collect();

    let mut address = tokens[0];
    if address.len() > 1
        && let Some(stripped) = address.strip_suffix([':', ','])
    {
        address = stripped;
    }
    let address = address.to_uppercase();
    let addressed =
        address == COMMON_MENTION.to_uppercase() || address == bot_mention.to_uppercase();

    if !addressed && !is_private {
        return CommandLine::Ignored;
    }

    if addressed {
        tokens.remove(0);
    }

    let Some((first, rest)) = tokens.split_first() else {
        return CommandLine::Greeting;
    };

    let name = first.to_uppercase();
    if name == "HELP" || name == "?" {
        return CommandLine::Help {
            topic: rest.first().map(|t| t.to_uppercase()),
        };
    }

    CommandLine::Invoke {
        name,
        arguments: rest.join(" "),
    }
}

/// Resolves and runs commands.
pub struct CommandDispatcher {
    builtins: Vec<BoxedCommand>,
}

impl CommandDispatcher {
    /// Creates a dispatcher over a fixed built-in set.
    pub fn new(builtins: Vec<BoxedCommand>) -> Self {
        Self { builtins }
    }

    /// The built-in commands, in registration order.
    pub fn builtins(&self) -> &[BoxedCommand] {
        &self.builtins
    }

    /// Finds a command by uppercased name, built-ins first.
    pub fn resolve<'a>(&'a self, name: &str, custom: &'a [BoxedCommand]) -> Option<&'a BoxedCommand> {
        self.builtins
            .iter()
            .chain(custom)
            .find(|c| c.name().to_uppercase() == name)
    }

    /// Handles `message` and returns the reply to send, if any.
    ///
    /// Command failures are logged and turned into [`INTERNAL_ERROR`];
    /// only cancellation is returned as an error.
    pub async fn dispatch(
        &self,
        message: &Message,
        bot_mention: &str,
        custom: &[BoxedCommand],
        cancel: &CancellationToken,
    ) -> ChatResult<Option<String>> {
        let channel = message.channel();
        let line = parse_command_line(&message.content, bot_mention, channel.is_private_channel);

        if line != CommandLine::Ignored {
            trace!(
                content = %message.content,
                user = %serde_json::to_string(&message.user).unwrap_or_default(),
                "Chat command"
            );
        }

        let reply = match line {
            CommandLine::Ignored => None,
            CommandLine::Greeting => Some(GREETING.to_owned()),
            CommandLine::Help { topic: None } => {
                let names: Vec<&str> = self.builtins.iter().chain(custom).map(|c| c.name()).collect();
                Some(format!("{HELP_PREFIX}{}", names.join(", ")))
            }
            CommandLine::Help { topic: Some(topic) } => Some(match self.resolve(&topic, custom) {
                Some(command) => format!(
                    "{}: {}{}",
                    command.name(),
                    command.help_text(),
                    if command.admin_only() { ADMIN_ONLY_SUFFIX } else { "" }
                ),
                None => UNKNOWN_COMMAND.to_owned(),
            }),
            CommandLine::Invoke { name, arguments } => match self.resolve(&name, custom) {
                None => Some(UNKNOWN_COMMAND.to_owned()),
                Some(command) if command.admin_only() && !channel.is_admin_channel => {
                    Some(ADMIN_ONLY_REJECTION.to_owned())
                }
                Some(command) => match command.invoke(&arguments, &message.user, cancel).await {
                    Ok(reply) => reply.filter(|text| !text.is_empty()),
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        error!(command = %command.name(), error = %e, "Error processing chat command");
                        Some(INTERNAL_ERROR.to_owned())
                    }
                },
            },
        };

        Ok(reply)
    }
}
