//! IRC connection settings.
//!
//! A connection is described by a `;`-separated connection string:
//!
//! ```text
//! address;port;nickname;ssl;password_type;password
//! irc.example.org;6697;tgsbot;true;sasl;hunter2
//! irc.example.org;6667;tgsbot;false;;
//! ```
//!
//! `password_type` is one of `server`, `sasl`, `nickserv` or `oper`, and is
//! empty exactly when `password` is.

use std::fmt;
use std::str::FromStr;

use crate::error::{IrcError, IrcResult};

/// How the password is presented to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrcPasswordType {
    /// `PASS` before registration.
    Server,
    /// SASL PLAIN during capability negotiation.
    Sasl,
    /// `IDENTIFY` to NickServ after registration.
    NickServ,
    /// `OPER` after registration.
    Oper,
}

impl IrcPasswordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Sasl => "sasl",
            Self::NickServ => "nickserv",
            Self::Oper => "oper",
        }
    }
}

impl FromStr for IrcPasswordType {
    type Err = IrcError;

    fn from_str(s: &str) -> IrcResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "sasl" => Ok(Self::Sasl),
            "nickserv" => Ok(Self::NickServ),
            "oper" => Ok(Self::Oper),
            other => Err(IrcError::invalid(format!("unknown password type '{other}'"))),
        }
    }
}

/// Password and the way it is sent.
#[derive(Clone, PartialEq, Eq)]
pub struct IrcCredentials {
    pub kind: IrcPasswordType,
    pub password: String,
}

impl fmt::Debug for IrcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcCredentials")
            .field("kind", &self.kind)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parsed IRC connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcConnectionConfig {
    pub address: String,
    pub port: u16,
    pub nickname: String,
    pub use_ssl: bool,
    pub credentials: Option<IrcCredentials>,
}

impl IrcConnectionConfig {
    /// Creates a config without credentials.
    pub fn new(address: impl Into<String>, port: u16, nickname: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port,
            nickname: nickname.into(),
            use_ssl: false,
            credentials: None,
        }
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_credentials(mut self, kind: IrcPasswordType, password: impl Into<String>) -> Self {
        self.credentials = Some(IrcCredentials {
            kind,
            password: password.into(),
        });
        self
    }

    /// Password of the given kind, if configured.
    pub fn password_for(&self, kind: IrcPasswordType) -> Option<&str> {
        self.credentials
            .as_ref()
            .filter(|c| c.kind == kind)
            .map(|c| c.password.as_str())
    }
}

impl FromStr for IrcConnectionConfig {
    type Err = IrcError;

    fn from_str(s: &str) -> IrcResult<Self> {
        let parts: Vec<&str> = s.split(';').collect();
        if parts.len() < 4 {
            return Err(IrcError::invalid(
                "expected address;port;nickname;ssl[;password_type;password]",
            ));
        }

        let address = parts[0].trim();
        if address.is_empty() {
            return Err(IrcError::invalid("missing address"));
        }
        let port = parts[1]
            .trim()
            .parse::<u16>()
            .map_err(|_| IrcError::invalid(format!("invalid port '{}'", parts[1])))?;
        let nickname = parts[2].trim();
        if nickname.is_empty() || nickname.contains(' ') {
            return Err(IrcError::invalid(format!("invalid nickname '{nickname}'")));
        }
        let use_ssl = parts[3]
            .trim()
            .parse::<bool>()
            .map_err(|_| IrcError::invalid(format!("invalid ssl flag '{}'", parts[3])))?;

        let kind = parts.get(4).map(|p| p.trim()).filter(|p| !p.is_empty());
        // The password may itself contain ';'.
        let password = (parts.len() > 5)
            .then(|| parts[5..].join(";"))
            .filter(|p| !p.is_empty());

        let credentials = match (kind, password) {
            (None, None) => None,
            (Some(kind), Some(password)) => Some(IrcCredentials {
                kind: kind.parse()?,
                password,
            }),
            (Some(_), None) => return Err(IrcError::invalid("password type without password")),
            (None, Some(_)) => return Err(IrcError::invalid("password without password type")),
        };

        Ok(Self {
            address: address.to_owned(),
            port,
            nickname: nickname.to_owned(),
            use_ssl,
            credentials,
        })
    }
}

impl fmt::Display for IrcConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{};{}", self.address, self.port, self.nickname, self.use_ssl)?;
        match &self.credentials {
            Some(c) => write!(f, ";{};{}", c.kind.as_str(), c.password),
            None => write!(f, ";;"),
        }
    }
}
