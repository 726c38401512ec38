//! The IRC [`Provider`].
//!
//! Each connected provider owns one background task that holds the socket:
//!
//! ```text
//!                 outbound (mpsc)              events (mpsc)
//! send_message ───────────────▶ connection ───────────────▶ next_message
//! map_channels ───────────────▶    task    ◀─── socket ───▶ IRC server
//! disconnect   ── Quit ───────▶
//! ```
//!
//! When the socket drops unexpectedly the task waits the reconnect
//! interval, reconnects, rejoins the current channel set and queues
//! [`ProviderEvent::Reconnected`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tgs_core::{
    CancellationToken, ChannelId, ChannelRepresentation, ChatBotSettings, ChatChannelSettings,
    ChatError, ChatResult, ChatUser, Message, Provider, ProviderEvent,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::IrcConnectionConfig;
use crate::connection::{self, IrcFramed, TIMEOUT};
use crate::line::{IrcLine, cmd, is_channel_name};

const PART_REASON: &str = "Channel removed from configuration";
const QUIT_REASON: &str = "Chat bridge shutting down";

/// Provider-local channel ids.
///
/// Channels and query partners share one id space. A query id also has a
/// `None` entry in the channel map so a channel name can never reuse it.
#[derive(Debug)]
struct ChannelIds {
    next: ChannelId,
    channels: BTreeMap<ChannelId, Option<String>>,
    queries: BTreeMap<ChannelId, String>,
}

impl Default for ChannelIds {
    fn default() -> Self {
        Self {
            next: 1,
            channels: BTreeMap::new(),
            queries: BTreeMap::new(),
        }
    }
}

/// How a message reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendKind {
    Message,
    Notice,
}

impl ChannelIds {
    fn channel_id(&mut self, name: &str) -> ChannelId {
        if let Some((id, _)) = self
            .channels
            .iter()
            .find(|(_, n)| n.as_deref() == Some(name))
        {
            return *id;
        }
        let id = self.allocate();
        self.channels.insert(id, Some(name.to_owned()));
        id
    }

    fn query_id(&mut self, nick: &str) -> ChannelId {
        if let Some((id, _)) = self.queries.iter().find(|(_, n)| n.as_str() == nick) {
            return *id;
        }
        let id = self.allocate();
        self.queries.insert(id, nick.to_owned());
        self.channels.insert(id, None);
        id
    }

    fn target(&self, id: ChannelId) -> Option<(String, SendKind)> {
        match self.channels.get(&id)? {
            Some(name) => Some((name.clone(), SendKind::Message)),
            None => self
                .queries
                .get(&id)
                .map(|nick| (nick.clone(), SendKind::Notice)),
        }
    }

    fn allocate(&mut self) -> ChannelId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// State shared with the connection task.
struct Shared {
    config: IrcConnectionConfig,
    connected: AtomicBool,
    nickname: RwLock<String>,
    reconnect_minutes: AtomicU32,
    ids: Mutex<ChannelIds>,
    /// Joined channels and their keys, in join order.
    joined: Mutex<Vec<(String, Option<String>)>>,
    events: mpsc::UnboundedSender<ProviderEvent>,
}

impl Shared {
    /// Turns an inbound PRIVMSG into a [`Message`].
    fn to_message(&self, line: &IrcLine) -> Option<Message> {
        let nick = line.nick()?;
        let target = line.param(0)?;
        let text = line.param(1)?;

        if nick.eq_ignore_ascii_case(&self.nickname.read()) {
            return None;
        }

        let is_private = !is_channel_name(target);
        let (user_id, channel_id) = {
            let mut ids = self.ids.lock();
            let user_id = ids.query_id(nick);
            let channel_id = if is_private {
                user_id
            } else {
                ids.channel_id(target)
            };
            (user_id, channel_id)
        };

        Some(Message::new(
            text,
            ChatUser {
                friendly_name: nick.to_owned(),
                mention: nick.to_owned(),
                real_id: user_id,
                channel: ChannelRepresentation {
                    real_id: channel_id,
                    connection_name: self.config.address.clone(),
                    friendly_name: if is_private {
                        format!("PM: {nick}")
                    } else {
                        target.to_owned()
                    },
                    is_admin_channel: false,
                    is_private_channel: is_private,
                    tag: None,
                },
            },
        ))
    }

    fn join_lines(&self) -> Vec<String> {
        self.joined
            .lock()
            .iter()
            .map(|(name, key)| cmd::join(name, key.as_deref()))
            .collect()
    }
}

/// Commands for the connection task.
enum Outbound {
    Line(String),
    Quit(String),
}

/// A running connection task.
struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// IRC chat provider.
pub struct IrcProvider {
    shared: Arc<Shared>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProviderEvent>>,
    connection: Mutex<Option<ConnectionHandle>>,
}

impl IrcProvider {
    /// Creates a disconnected provider.
    pub fn new(config: IrcConnectionConfig, reconnect_minutes: u32) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                nickname: RwLock::new(config.nickname.clone()),
                config,
                connected: AtomicBool::new(false),
                reconnect_minutes: AtomicU32::new(reconnect_minutes),
                ids: Mutex::new(ChannelIds::default()),
                joined: Mutex::new(Vec::new()),
                events: events_tx,
            }),
            events: tokio::sync::Mutex::new(events_rx),
            connection: Mutex::new(None),
        }
    }

    /// Creates a provider from connection settings.
    pub fn from_settings(settings: &ChatBotSettings) -> ChatResult<Self> {
        let config: IrcConnectionConfig = settings.connection_string.parse()?;
        Ok(Self::new(config, settings.reconnection_interval))
    }

    /// The parsed connection parameters.
    pub fn config(&self) -> &IrcConnectionConfig {
        &self.shared.config
    }

    fn queue(&self, line: String) -> bool {
        match self.connection.lock().as_ref() {
            Some(handle) => handle.outbound.send(Outbound::Line(line)).is_ok(),
            None => false,
        }
    }

    fn stop_task(&self) -> Option<ConnectionHandle> {
        let handle = self.connection.lock().take();
        if let Some(handle) = &handle {
            handle.cancel.cancel();
        }
        handle
    }
}

impl Drop for IrcProvider {
    fn drop(&mut self) {
        self.stop_task();
    }
}

#[async_trait]
impl Provider for IrcProvider {
    fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn bot_mention(&self) -> String {
        self.shared.nickname.read().clone()
    }

    async fn connect(&self, cancel: &CancellationToken) -> ChatResult<bool> {
        if let Some(old) = self.stop_task() {
            let _ = old.task.await;
        }

        let config = &self.shared.config;
        info!(address = %config.address, port = config.port, "Connecting to IRC");
        let session = tokio::select! {
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            result = connection::establish(config) => result,
        };
        let mut session = match session {
            Ok(session) => session,
            Err(e) => {
                warn!(address = %config.address, error = %e, "Unable to connect to IRC");
                return Ok(false);
            }
        };

        for line in self.shared.join_lines() {
            if let Err(e) = session.framed.send(line).await {
                warn!(address = %config.address, error = %e, "Unable to rejoin IRC channels");
                return Ok(false);
            }
        }

        *self.shared.nickname.write() = session.nickname;
        self.shared.connected.store(true, Ordering::Release);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task_cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            self.shared.clone(),
            session.framed,
            outbound_rx,
            task_cancel.clone(),
        ));
        *self.connection.lock() = Some(ConnectionHandle {
            outbound: outbound_tx,
            cancel: task_cancel,
            task,
        });
        Ok(true)
    }

    async fn disconnect(&self, cancel: &CancellationToken) -> ChatResult<()> {
        let Some(handle) = self.connection.lock().take() else {
            return Ok(());
        };
        let ConnectionHandle {
            outbound,
            cancel: task_cancel,
            mut task,
        } = handle;

        let _ = outbound.send(Outbound::Quit(QUIT_REASON.to_owned()));
        tokio::select! {
            _ = cancel.cancelled() => {
                task_cancel.cancel();
                return Err(ChatError::Cancelled);
            }
            _ = tokio::time::sleep(TIMEOUT) => {
                warn!(address = %self.shared.config.address, "IRC quit timed out");
                task_cancel.cancel();
                let _ = task.await;
            }
            _ = &mut task => {}
        }
        self.shared.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn map_channels(
        &self,
        channels: &[ChatChannelSettings],
        _cancel: &CancellationToken,
    ) -> ChatResult<Vec<ChannelRepresentation>> {
        if channels.iter().any(|c| c.irc_channel_name().is_none()) {
            return Err(ChatError::invalid_config("ChatChannel missing IrcChannel!"));
        }

        let mut desired: Vec<(String, Option<String>)> = Vec::new();
        for channel in channels {
            let name = channel.irc_channel_name().unwrap_or_default();
            if !desired.iter().any(|(n, _)| n == name) {
                desired.push((name.to_owned(), channel.irc_channel_key().map(str::to_owned)));
            }
        }

        let (to_part, to_join) = {
            let mut joined = self.shared.joined.lock();
            let to_part: Vec<String> = joined
                .iter()
                .filter(|(name, _)| !desired.iter().any(|(d, _)| d == name))
                .map(|(name, _)| name.clone())
                .collect();
            let to_join: Vec<(String, Option<String>)> = desired
                .iter()
                .filter(|(name, _)| !joined.iter().any(|(j, _)| j == name))
                .cloned()
                .collect();
            *joined = desired;
            (to_part, to_join)
        };

        for name in &to_part {
            debug!(channel = %name, "Parting IRC channel");
            self.queue(cmd::part(name, PART_REASON));
        }
        for (name, key) in &to_join {
            debug!(channel = %name, "Joining IRC channel");
            self.queue(cmd::join(name, key.as_deref()));
        }

        let mut ids = self.shared.ids.lock();
        Ok(channels
            .iter()
            .map(|channel| {
                let name = channel.irc_channel_name().unwrap_or_default();
                ChannelRepresentation {
                    real_id: ids.channel_id(name),
                    connection_name: self.shared.config.address.clone(),
                    friendly_name: name.to_owned(),
                    is_admin_channel: channel.is_admin_channel,
                    is_private_channel: false,
                    tag: channel.tag.clone(),
                }
            })
            .collect())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
        _cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let Some((target, kind)) = self.shared.ids.lock().target(channel_id) else {
            warn!(channel_id, "Unknown IRC channel id");
            return Ok(());
        };

        for line in text.lines().filter(|l| !l.is_empty()) {
            let line = match kind {
                SendKind::Message => cmd::privmsg(&target, line),
                SendKind::Notice => cmd::notice(&target, line),
            };
            if !self.queue(line) {
                warn!(target = %target, "Unable to send to IRC channel: not connected");
                break;
            }
        }
        Ok(())
    }

    async fn next_message(&self, cancel: &CancellationToken) -> ChatResult<ProviderEvent> {
        let mut events = self.events.lock().await;
        tokio::select! {
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            event = events.recv() => event.ok_or(ChatError::Cancelled),
        }
    }

    fn set_reconnect_interval(&self, minutes: u32) {
        self.shared
            .reconnect_minutes
            .store(minutes, Ordering::Relaxed);
    }
}

/// How a session ended.
enum SessionEnd {
    Quit,
    Cancelled,
    Lost(String),
}

/// Owns the socket: serves one session, then reconnects until told to stop.
async fn run_connection(
    shared: Arc<Shared>,
    mut framed: IrcFramed,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) {
    let address = shared.config.address.clone();
    loop {
        let reason = match serve(&shared, &mut framed, &mut outbound, &cancel).await {
            SessionEnd::Quit | SessionEnd::Cancelled => break,
            SessionEnd::Lost(reason) => reason,
        };
        shared.connected.store(false, Ordering::Release);
        warn!(address = %address, reason = %reason, "IRC connection lost");

        framed = loop {
            let minutes = shared.reconnect_minutes.load(Ordering::Relaxed).max(1);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(u64::from(minutes) * 60)) => {}
            }

            let mut session = match connection::establish(&shared.config).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(address = %address, error = %e, "IRC reconnect failed");
                    continue;
                }
            };
            let mut rejoined = true;
            for line in shared.join_lines() {
                if session.framed.send(line).await.is_err() {
                    rejoined = false;
                    break;
                }
            }
            if rejoined {
                *shared.nickname.write() = session.nickname;
                break session.framed;
            }
        };

        shared.connected.store(true, Ordering::Release);
        info!(address = %address, "IRC reconnected");
        let _ = shared.events.send(ProviderEvent::Reconnected);
    }
    shared.connected.store(false, Ordering::Release);
    debug!(address = %address, "IRC connection task finished");
}

/// Pumps one registered session.
async fn serve(
    shared: &Shared,
    framed: &mut IrcFramed,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    cancel: &CancellationToken,
) -> SessionEnd {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            command = outbound.recv() => match command {
                Some(Outbound::Line(line)) => {
                    if let Err(e) = framed.send(line).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                Some(Outbound::Quit(reason)) => {
                    let _ = framed.send(cmd::quit(&reason)).await;
                    return SessionEnd::Quit;
                }
                None => return SessionEnd::Cancelled,
            },
            line = framed.next() => match line {
                Some(Ok(line)) => {
                    if let Some(reply) = handle_line(shared, &line)
                        && let Err(e) = framed.send(reply).await
                    {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                None => return SessionEnd::Lost("closed by server".to_owned()),
            },
        }
    }
}

/// Reacts to one inbound line, returning an immediate reply if needed.
fn handle_line(shared: &Shared, line: &IrcLine) -> Option<String> {
    match line.command.as_str() {
        "PING" => Some(cmd::pong(line.trailing().unwrap_or_default())),
        "NICK" => {
            let mut nickname = shared.nickname.write();
            if line.nick().is_some_and(|n| n.eq_ignore_ascii_case(&nickname))
                && let Some(new) = line.param(0)
            {
                debug!(nickname = %new, "IRC nickname changed");
                *nickname = new.to_owned();
            }
            None
        }
        "KICK" => {
            let channel = line.param(0)?;
            let kicked = line.param(1)?;
            if !kicked.eq_ignore_ascii_case(&shared.nickname.read()) {
                return None;
            }
            let joined = shared.joined.lock();
            let (name, key) = joined
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(channel))?;
            warn!(
                channel = %name,
                by = line.nick().unwrap_or_default(),
                "Kicked from IRC channel, rejoining"
            );
            Some(cmd::join(name, key.as_deref()))
        }
        "PRIVMSG" => {
            let text = line.param(1)?;
            if let Some(ctcp) = text.strip_prefix('\u{1}') {
                return ctcp
                    .trim_end_matches('\u{1}')
                    .eq_ignore_ascii_case("VERSION")
                    .then(|| {
                        cmd::notice(
                            line.nick().unwrap_or_default(),
                            &format!("\u{1}VERSION tgs-irc {}\u{1}", env!("CARGO_PKG_VERSION")),
                        )
                    });
            }
            if let Some(message) = shared.to_message(line) {
                trace!(channel = %message.user.channel.friendly_name, "IRC message");
                let _ = shared.events.send(ProviderEvent::Message(message));
            }
            None
        }
        _ => None,
    }
}
