//! Configuration validation utilities.

use std::collections::HashSet;

use tgs_core::{ChatBotSettings, ChatChannelSettings, ChatProviderKind};

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, TgsConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TgsConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_bots_config(&config.chat.bots)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (module, level) in &logging.filters {
        if module.is_empty() {
            return Err(ConfigError::validation("Log filter module cannot be empty"));
        }
        if level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::validation(format!(
                "Invalid log level for {module}: {level}. Valid values are: {:?}",
                LogLevel::NAMES
            )));
        }
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the json-log feature",
        ));
    }

    Ok(())
}

/// Validates all connection settings.
fn validate_bots_config(bots: &[ChatBotSettings]) -> ConfigResult<()> {
    let mut seen_ids = HashSet::new();

    for bot in bots {
        if !seen_ids.insert(bot.id) {
            return Err(ConfigError::DuplicateBotId(bot.id.to_string()));
        }

        validate_bot_config(bot)?;
    }

    Ok(())
}

/// Validates a single connection.
fn validate_bot_config(bot: &ChatBotSettings) -> ConfigResult<()> {
    if bot.name.trim().is_empty() {
        return Err(ConfigError::missing_field(format!(
            "chat.bots[{}].name",
            bot.id
        )));
    }

    if bot.connection_string.is_empty() {
        return Err(ConfigError::missing_field(format!(
            "chat.bots[{}].connection_string",
            bot.id
        )));
    }

    if bot.reconnection_interval == 0 {
        return Err(ConfigError::validation(format!(
            "Reconnection interval of bot {} must be greater than 0",
            bot.id
        )));
    }

    validate_connection_string(bot)?;

    for channel in &bot.channels {
        validate_channel_config(bot, channel)?;
    }

    Ok(())
}

/// Checks the connection string parses for its provider kind.
#[cfg(feature = "irc")]
fn validate_connection_string(bot: &ChatBotSettings) -> ConfigResult<()> {
    if bot.provider == ChatProviderKind::Irc {
        bot.connection_string
            .parse::<tgs_irc::IrcConnectionConfig>()
            .map_err(|e| ConfigError::validation(format!("Bot {}: {e}", bot.id)))?;
    }
    Ok(())
}

#[cfg(not(feature = "irc"))]
fn validate_connection_string(_bot: &ChatBotSettings) -> ConfigResult<()> {
    Ok(())
}

/// Checks a channel carries the addressing data its provider needs.
fn validate_channel_config(bot: &ChatBotSettings, channel: &ChatChannelSettings) -> ConfigResult<()> {
    match bot.provider {
        ChatProviderKind::Irc => {
            if channel.irc_channel_name().is_none_or(str::is_empty) {
                return Err(ConfigError::validation(format!(
                    "Bot {}: channel missing irc_channel",
                    bot.id
                )));
            }
        }
        #[allow(unreachable_patterns)]
        _ => {}
    }
    Ok(())
}
