//! Socket setup and registration.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::config::{IrcConnectionConfig, IrcPasswordType};
use crate::error::{IrcError, IrcResult};
use crate::line::{IrcCodec, IrcLine, cmd};

/// Upper bound for connecting and registering.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A byte stream an IRC session can run over.
pub trait IrcTransport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> IrcTransport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A framed connection to an IRC server.
pub type IrcFramed = Framed<Box<dyn IrcTransport>, IrcCodec>;

/// A registered session.
pub struct Session {
    pub framed: IrcFramed,
    /// Nickname the server accepted.
    pub nickname: String,
}

/// Opens the socket, optionally wrapped in TLS.
pub async fn open(config: &IrcConnectionConfig) -> IrcResult<IrcFramed> {
    let tcp = TcpStream::connect((config.address.as_str(), config.port)).await?;
    tcp.set_nodelay(true)?;

    let transport: Box<dyn IrcTransport> = if config.use_ssl {
        tls::wrap(&config.address, tcp).await?
    } else {
        Box::new(tcp)
    };
    Ok(Framed::new(transport, IrcCodec::default()))
}

/// Runs registration on an open connection until the server welcomes us.
///
/// Handles server passwords, SASL PLAIN and nickname collisions, then
/// performs NickServ or OPER authentication.
pub async fn register(mut framed: IrcFramed, config: &IrcConnectionConfig) -> IrcResult<Session> {
    let mut nickname = config.nickname.clone();
    let sasl = config.password_for(IrcPasswordType::Sasl);

    if sasl.is_some() {
        framed.send("CAP REQ :sasl".to_owned()).await?;
    }
    if let Some(password) = config.password_for(IrcPasswordType::Server) {
        framed.send(cmd::pass(password)).await?;
    }
    framed.send(cmd::nick(&nickname)).await?;
    framed.send(cmd::user(&config.nickname)).await?;

    loop {
        let line = framed.next().await.ok_or(IrcError::Closed)??;
        trace!(command = %line.command, "Registration line");
        match line.command.as_str() {
            "PING" => {
                framed.send(cmd::pong(line.trailing().unwrap_or_default())).await?;
            }
            "CAP" => {
                let acked = line.param(1).is_some_and(|s| s.eq_ignore_ascii_case("ACK"));
                let has_sasl = line.trailing().is_some_and(|caps| {
                    caps.split(' ').any(|c| c.eq_ignore_ascii_case("sasl"))
                });
                if acked && has_sasl {
                    framed.send("AUTHENTICATE PLAIN".to_owned()).await?;
                } else {
                    warn!(address = %config.address, "Server refused SASL capability");
                    framed.send("CAP END".to_owned()).await?;
                }
            }
            "AUTHENTICATE" if line.param(0) == Some("+") => {
                if let Some(password) = sasl {
                    framed.send(format!("AUTHENTICATE {}", sasl_plain(&config.nickname, password))).await?;
                }
            }
            "903" => {
                debug!(address = %config.address, "SASL authentication succeeded");
                framed.send("CAP END".to_owned()).await?;
            }
            "902" | "904" | "905" | "906" | "908" => {
                warn!(address = %config.address, code = %line.command, "SASL authentication failed");
                framed.send("CAP END".to_owned()).await?;
            }
            "432" | "433" | "436" => {
                nickname.push('_');
                debug!(nickname = %nickname, "Nickname unavailable, retrying");
                framed.send(cmd::nick(&nickname)).await?;
            }
            "001" => {
                if let Some(accepted) = line.param(0) {
                    nickname = accepted.to_owned();
                }
                break;
            }
            "ERROR" | "464" | "465" => {
                return Err(IrcError::Registration(
                    line.trailing().unwrap_or("refused").to_owned(),
                ));
            }
            _ => {}
        }
    }

    if let Some(password) = config.password_for(IrcPasswordType::NickServ) {
        framed
            .send(cmd::privmsg("NickServ", &format!("IDENTIFY {password}")))
            .await?;
    }
    if let Some(password) = config.password_for(IrcPasswordType::Oper) {
        framed.send(cmd::oper(&config.nickname, password)).await?;
    }

    Ok(Session { framed, nickname })
}

/// Base64 SASL PLAIN payload: `authzid \0 authcid \0 password`.
pub fn sasl_plain(nickname: &str, password: &str) -> String {
    STANDARD.encode(format!("{nickname}\0{nickname}\0{password}"))
}

/// Opens and registers within [`TIMEOUT`].
pub async fn establish(config: &IrcConnectionConfig) -> IrcResult<Session> {
    let attempt = async {
        let framed = open(config).await?;
        register(framed, config).await
    };
    tokio::time::timeout(TIMEOUT, attempt)
        .await
        .map_err(|_| IrcError::Registration("timed out".to_owned()))?
}

#[cfg(feature = "tls")]
mod tls {
    use std::sync::Arc;

    use rustls::pki_types::ServerName;
    use tokio::net::TcpStream;
    use tokio_rustls::TlsConnector;

    use super::IrcTransport;
    use crate::error::{IrcError, IrcResult};

    pub(super) async fn wrap(address: &str, tcp: TcpStream) -> IrcResult<Box<dyn IrcTransport>> {
        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().certs {
            let _ = roots.add(cert);
        }
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| IrcError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let server_name = ServerName::try_from(address.to_owned())
            .map_err(|e| IrcError::Tls(e.to_string()))?;
        let stream = TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await?;
        Ok(Box::new(stream))
    }
}

#[cfg(not(feature = "tls"))]
mod tls {
    use tokio::net::TcpStream;

    use super::IrcTransport;
    use crate::error::{IrcError, IrcResult};

    pub(super) async fn wrap(_address: &str, _tcp: TcpStream) -> IrcResult<Box<dyn IrcTransport>> {
        Err(IrcError::Tls("built without the `tls` feature".to_owned()))
    }
}
