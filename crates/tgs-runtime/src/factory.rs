//! Provider construction for the configured chat networks.

#[cfg(feature = "irc")]
use std::sync::Arc;

use tgs_core::{BoxedProvider, ChatBotSettings, ChatError, ChatProviderKind, ChatResult, ProviderFactory};
use tracing::debug;

/// Builds a provider for every chat network compiled into this crate.
///
/// IRC is available with the default `irc` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProviderFactory;

impl DefaultProviderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create_provider(&self, settings: &ChatBotSettings) -> ChatResult<BoxedProvider> {
        debug!(
            connection_id = settings.id,
            provider = %settings.provider,
            "Creating chat provider"
        );
        match settings.provider {
            #[cfg(feature = "irc")]
            ChatProviderKind::Irc => Ok(Arc::new(tgs_irc::IrcProvider::from_settings(settings)?)),
            #[allow(unreachable_patterns)]
            kind => Err(ChatError::invalid_config(format!(
                "Unsupported chat provider: {kind}"
            ))),
        }
    }
}
