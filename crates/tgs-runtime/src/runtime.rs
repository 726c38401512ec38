//! Runtime shell around the [`ChatManager`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tgs_runtime::ChatRuntime;
//!
//! // Loads tgs.toml from the current directory
//! let runtime = ChatRuntime::new();
//!
//! // Custom configuration path
//! let runtime = ChatRuntime::builder()
//!     .config_file("config/tgs.toml")
//!     .profile("production")
//!     .build()?;
//!
//! runtime.run().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tgs_chat::{BuiltinCommandFactory, ChatManager, ChatTrackingContext};
use tgs_core::{CancellationToken, CommandFactory, CustomCommandHandler, ProviderFactory};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, TgsConfig};
use crate::error::RuntimeResult;
use crate::factory::DefaultProviderFactory;
use crate::logging;

/// Owns the configured [`ChatManager`] and drives its lifecycle.
pub struct ChatRuntime {
    config: TgsConfig,
    manager: Arc<ChatManager>,
    /// Cancels startup work when the runtime is stopped mid-start.
    cancel: CancellationToken,
    running: AtomicBool,
}

impl ChatRuntime {
    /// Creates a runtime from `tgs.toml` in the current directory.
    ///
    /// Falls back to defaults (no connections) if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                TgsConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime with the default provider and command factories.
    pub fn from_config(config: &TgsConfig) -> Self {
        Self::with_factories(
            config,
            Arc::new(DefaultProviderFactory::new()),
            Arc::new(BuiltinCommandFactory::new()),
        )
    }

    /// Creates a runtime with explicit factories.
    ///
    /// Initializes logging from the configuration first.
    pub fn with_factories(
        config: &TgsConfig,
        provider_factory: Arc<dyn ProviderFactory>,
        command_factory: Arc<dyn CommandFactory>,
    ) -> Self {
        logging::init_from_config(&config.logging);

        let manager = Arc::new(ChatManager::new(
            provider_factory,
            command_factory,
            config.chat.bots.clone(),
        ));

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            bots = config.chat.bots.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            manager,
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &TgsConfig {
        &self.config
    }

    /// The chat manager, for sending messages and changing settings.
    pub fn manager(&self) -> &Arc<ChatManager> {
        &self.manager
    }

    /// Registers the custom command handler. May only be called once.
    pub fn register_command_handler(
        &self,
        handler: Arc<dyn CustomCommandHandler>,
    ) -> RuntimeResult<()> {
        self.manager.register_command_handler(handler)?;
        Ok(())
    }

    /// Issues a tracking context for a custom command supplier.
    pub fn create_tracking_context(&self) -> RuntimeResult<ChatTrackingContext> {
        Ok(self.manager.create_tracking_context()?)
    }

    /// Returns whether the runtime is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Connects every enabled connection and starts the merge loop.
    ///
    /// A runtime runs once; starting it again after [`stop`](Self::stop)
    /// fails with [`ChatError::InvalidOperation`](tgs_core::ChatError).
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Runtime is already running");
            return Ok(());
        }

        info!("Starting chat runtime");
        if let Err(e) = self.manager.start(&self.cancel).await {
            self.running.store(false, Ordering::Release);
            return Err(e.into());
        }
        info!("Runtime started");
        Ok(())
    }

    /// Stops the merge loop and disconnects every provider.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            warn!("Runtime is not running");
            return Ok(());
        }

        info!("Stopping chat runtime");
        self.cancel.cancel();
        self.manager.stop(&CancellationToken::new()).await?;
        info!("Runtime stopped");
        Ok(())
    }

    /// Runs the runtime until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;

        info!("Chat bridge is now running. Press Ctrl+C to stop.");
        self.wait_for_shutdown().await;

        self.stop().await
    }

    /// Runs the runtime until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    /// Waits for shutdown signals (Ctrl+C or SIGTERM).
    async fn wait_for_shutdown(&self) {
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        result = signal::ctrl_c() => log_ctrl_c(result),
                        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Unable to listen for SIGTERM");
                    log_ctrl_c(signal::ctrl_c().await);
                }
            }
        }

        #[cfg(not(unix))]
        log_ctrl_c(signal::ctrl_c().await);
    }
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Unable to listen for Ctrl+C, shutting down"),
    }
}

impl Default for ChatRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChatRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRuntime")
            .field("bots", &self.config.chat.bots.len())
            .field("running", &self.is_running())
            .field("manager", &self.manager)
            .finish()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`ChatRuntime`] with custom configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    provider_factory: Option<Arc<dyn ProviderFactory>>,
    command_factory: Option<Arc<dyn CommandFactory>>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder searching the current directory.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            provider_factory: None,
            command_factory: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: TgsConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Replaces the default provider factory.
    pub fn provider_factory(mut self, factory: impl ProviderFactory) -> Self {
        self.provider_factory = Some(Arc::new(factory));
        self
    }

    /// Replaces the built-in command factory.
    pub fn command_factory(mut self, factory: impl CommandFactory) -> Self {
        self.command_factory = Some(Arc::new(factory));
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> ConfigResult<ChatRuntime> {
        let config = self.config_loader.load()?;
        Ok(ChatRuntime::with_factories(
            &config,
            self.provider_factory
                .unwrap_or_else(|| Arc::new(DefaultProviderFactory::new())),
            self.command_factory
                .unwrap_or_else(|| Arc::new(BuiltinCommandFactory::new())),
        ))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
