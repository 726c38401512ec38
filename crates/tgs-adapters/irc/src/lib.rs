//! # IRC provider for the tgs chat bridge
//!
//! Connects a [`tgs_core::Provider`] to an IRC network.
//!
//! ## Connection string
//!
//! ```text
//! address;port;nickname;use_ssl[;password_type;password]
//! ```
//!
//! `password_type` is one of `server`, `sasl`, `nickserv` or `oper`
//! (case-insensitive). The password may itself contain `;`.
//!
//! ```rust,ignore
//! use tgs_irc::IrcProvider;
//!
//! let provider = IrcProvider::from_settings(&settings)?;
//! provider.connect(&cancel).await?;
//! ```
//!
//! ## Channels
//!
//! Channel entries are `#name` or `#name;key`. Mapping a new channel set
//! parts channels that are no longer listed and joins the new ones.
//! Channels and private query partners share one id space; a user's id is
//! also the id of their private query.
//!
//! ## TLS
//!
//! The default `tls` feature enables `use_ssl` connections through rustls
//! with the platform's native root certificates.

pub mod config;
pub mod connection;
pub mod error;
pub mod line;
mod provider;

pub use config::{IrcConnectionConfig, IrcCredentials, IrcPasswordType};
pub use error::{IrcError, IrcResult};
pub use line::{IrcCodec, IrcLine};
pub use provider::IrcProvider;
