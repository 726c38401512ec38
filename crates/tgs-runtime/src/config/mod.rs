//! Configuration module for the tgs runtime.
//!
//! Layered loading (files, environment, programmatic overrides) through
//! figment, plus validation of the chat connection list.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ChatConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
    TgsConfig,
};
pub use validation::validate_config;
