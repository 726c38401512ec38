//! TGS Runtime - the process shell around the chat bridge.
//!
//! This crate provides:
//! - Layered configuration loading and validation (`config`)
//! - Logging setup (`logging`)
//! - Provider construction for the compiled-in networks (`DefaultProviderFactory`)
//! - Lifecycle orchestration (`ChatRuntime`)
//!
//! ```ignore
//! use tgs_runtime::ChatRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ChatRuntime::builder().profile("production").build()?;
//!     runtime.register_command_handler(Arc::new(MyHandler))?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `irc` (default): IRC connections through `tgs-irc`
//! - `tls` (default, via `tgs-irc`): TLS for IRC
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ChatConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, TgsConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use factory::DefaultProviderFactory;
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ChatRuntime, RuntimeBuilder};

// Re-export tracing for use by embedders
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
