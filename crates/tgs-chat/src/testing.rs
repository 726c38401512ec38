//! In-memory provider used by the orchestrator tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tgs_core::{
    BoxedProvider, CancellationToken, ChannelId, ChannelRepresentation, ChatBotSettings,
    ChatChannelSettings, ChatError, ChatResult, ChatUser, ConnectionId, Message, Provider,
    ProviderEvent, ProviderFactory,
};
use tokio::sync::{Notify, mpsc};

/// A provider driven entirely by the test.
pub(crate) struct ScriptedProvider {
    pub(crate) settings: ChatBotSettings,
    connected: AtomicBool,
    connect_succeeds: AtomicBool,
    inbox_tx: mpsc::UnboundedSender<ProviderEvent>,
    inbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProviderEvent>>,
    joined: Mutex<HashMap<String, ChannelId>>,
    next_local_id: Mutex<ChannelId>,
    sent: Mutex<Vec<(ChannelId, String)>>,
    map_gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) reconnect_interval: AtomicU32,
    pub(crate) connect_calls: AtomicUsize,
    pub(crate) disconnect_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(settings: ChatBotSettings) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            reconnect_interval: AtomicU32::new(settings.reconnection_interval),
            settings,
            connected: AtomicBool::new(false),
            connect_succeeds: AtomicBool::new(true),
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
            joined: Mutex::new(HashMap::new()),
            next_local_id: Mutex::new(100),
            sent: Mutex::new(Vec::new()),
            map_gate: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    /// Queues an event for `next_message`.
    pub(crate) fn push(&self, event: ProviderEvent) {
        let _ = self.inbox_tx.send(event);
    }

    /// Queues a message in a group channel identified by its local id.
    pub(crate) fn say_in_channel(&self, local_id: ChannelId, content: &str) {
        self.push(ProviderEvent::Message(Message::new(
            content,
            self.user("carol", local_id, false),
        )));
    }

    /// Queues a private message from `nick`, whose query has `local_id`.
    pub(crate) fn say_privately(&self, nick: &str, local_id: ChannelId, content: &str) {
        self.push(ProviderEvent::Message(Message::new(
            content,
            self.user(nick, local_id, true),
        )));
    }

    fn user(&self, nick: &str, local_id: ChannelId, private: bool) -> ChatUser {
        ChatUser {
            friendly_name: nick.into(),
            mention: nick.into(),
            real_id: 1,
            channel: ChannelRepresentation {
                real_id: local_id,
                connection_name: self.settings.name.clone(),
                friendly_name: if private { format!("PM: {nick}") } else { String::new() },
                is_admin_channel: false,
                is_private_channel: private,
                tag: None,
            },
        }
    }

    /// Local id assigned to `channel`, if joined.
    pub(crate) fn local_id(&self, channel: &str) -> Option<ChannelId> {
        self.joined.lock().get(channel).copied()
    }

    pub(crate) fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().clone()
    }

    /// Flips the link state as if the network dropped or came back.
    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn fail_connects(&self) {
        self.connect_succeeds.store(false, Ordering::SeqCst);
    }

    /// Makes `map_channels` wait until the returned gate is notified.
    pub(crate) fn gate_mapping(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.map_gate.lock() = Some(gate.clone());
        gate
    }

    /// Waits until at least `count` messages were sent.
    pub(crate) async fn wait_for_sent(&self, count: usize) -> Vec<(ChannelId, String)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for sent messages")
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn bot_mention(&self) -> String {
        "tgsbot".into()
    }

    async fn connect(&self, cancel: &CancellationToken) -> ChatResult<bool> {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.connect_succeeds.load(Ordering::SeqCst);
        self.connected.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    async fn disconnect(&self, _cancel: &CancellationToken) -> ChatResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn map_channels(
        &self,
        channels: &[ChatChannelSettings],
        _cancel: &CancellationToken,
    ) -> ChatResult<Vec<ChannelRepresentation>> {
        let gate = self.map_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut joined = self.joined.lock();
        let mut next = self.next_local_id.lock();
        let mut still_joined = HashMap::new();
        let mut result = Vec::with_capacity(channels.len());
        for settings in channels {
            let name = settings
                .irc_channel_name()
                .ok_or_else(|| ChatError::invalid_config("ChatChannel missing IrcChannel!"))?;
            let id = match joined.get(name) {
                Some(id) => *id,
                None => {
                    *next += 1;
                    *next
                }
            };
            still_joined.insert(name.to_owned(), id);
            result.push(ChannelRepresentation {
                real_id: id,
                connection_name: self.settings.name.clone(),
                friendly_name: name.to_owned(),
                is_admin_channel: settings.is_admin_channel,
                is_private_channel: false,
                tag: settings.tag.clone(),
            });
        }
        *joined = still_joined;
        Ok(result)
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
        _cancel: &CancellationToken,
    ) -> ChatResult<()> {
        self.sent.lock().push((channel_id, text.to_owned()));
        Ok(())
    }

    async fn next_message(&self, cancel: &CancellationToken) -> ChatResult<ProviderEvent> {
        let mut inbox = self.inbox_rx.lock().await;
        tokio::select! {
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            event = inbox.recv() => match event {
                Some(event) => Ok(event),
                None => std::future::pending().await,
            },
        }
    }

    fn set_reconnect_interval(&self, minutes: u32) {
        self.reconnect_interval.store(minutes, Ordering::SeqCst);
    }
}

/// Factory that keeps every provider it builds.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    built: Mutex<Vec<Arc<ScriptedProvider>>>,
}

impl ScriptedFactory {
    /// The most recent provider built for `id`.
    pub(crate) fn latest(&self, id: ConnectionId) -> Option<Arc<ScriptedProvider>> {
        self.built
            .lock()
            .iter()
            .rev()
            .find(|p| p.settings.id == id)
            .cloned()
    }

    pub(crate) fn built_count(&self, id: ConnectionId) -> usize {
        self.built
            .lock()
            .iter()
            .filter(|p| p.settings.id == id)
            .count()
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create_provider(&self, settings: &ChatBotSettings) -> ChatResult<BoxedProvider> {
        if settings.connection_string.is_empty() {
            return Err(ChatError::invalid_config("empty connection string"));
        }
        let provider = Arc::new(ScriptedProvider::new(settings.clone()));
        self.built.lock().push(provider.clone());
        Ok(provider)
    }
}
