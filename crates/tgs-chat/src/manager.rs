//! The chat orchestrator.
//!
//! [`ChatManager`] owns every provider, the channel identity table and the
//! set of live tracking contexts, and runs the merge loop that turns N
//! provider streams into one sequence of dispatched messages.
//!
//! # Lifecycle
//!
//! ```text
//! new ──▶ [change_settings / register_command_handler] ──▶ start ──▶ … ──▶ stop
//!                                                            │
//!                                                            └─ spawns the merge loop
//! ```
//!
//! # Locking
//!
//! Each piece of shared state is its own lock domain. When several are
//! needed together they are taken in this order and never re-entered:
//!
//! ```text
//! providers ──▶ mapped_channels ──▶ tracking_contexts ──▶ coordination
//! ```
//!
//! `active_chat_bots` is never held together with any other lock. No lock
//! is held across an `.await`: work that has to be awaited (tracking
//! notifications, disconnects) is captured while locked and awaited after
//! release.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use tgs_core::{
    BoxedCommand, BoxedProvider, CancellationToken, ChannelId, ChannelRepresentation,
    ChatBotSettings, ChatChannelSettings, ChatError, ChatResult, CommandFactory, ConnectionId,
    CustomCommandHandler, Message, ProviderEvent, ProviderFactory, RenewableSignal,
    RestartHandler,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::CommandDispatcher;
use crate::mapping::{ChannelIdCounter, ChannelMapping, ChannelTable};
use crate::tracking::{ChatTrackingContext, TrackingShared};

/// How long the merge loop waits before rechecking providers that have no
/// read in flight.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

const WATCHDOG_PREFIX: &str = "WD: ";
const UPDATES_PREFIX: &str = "DM: ";

type TrackingRegistry = Arc<Mutex<Vec<Arc<TrackingShared>>>>;
type Notification = BoxFuture<'static, ChatResult<()>>;

/// Id allocation and the topology-change signal.
struct Coordination {
    ids: ChannelIdCounter,
    connections_updated: RenewableSignal,
}

/// An outstanding `next_message` call.
struct PendingMessage {
    provider: BoxedProvider,
    future: BoxFuture<'static, ChatResult<ProviderEvent>>,
}

/// The chat orchestrator. Shared as `Arc<ChatManager>`.
pub struct ChatManager {
    provider_factory: Arc<dyn ProviderFactory>,
    command_factory: Arc<dyn CommandFactory>,
    dispatcher: OnceLock<CommandDispatcher>,
    custom_command_handler: OnceLock<Arc<dyn CustomCommandHandler>>,

    providers: Mutex<HashMap<ConnectionId, BoxedProvider>>,
    mapped_channels: Mutex<ChannelTable>,
    tracking_contexts: TrackingRegistry,
    coordination: Mutex<Coordination>,
    active_chat_bots: Mutex<Vec<ChatBotSettings>>,

    started: AtomicBool,
    handler_cancel: CancellationToken,
    chat_handler: Mutex<Option<JoinHandle<()>>>,
}

impl ChatManager {
    /// Creates a manager that knows about `initial_bots` but has not
    /// connected anything yet.
    pub fn new(
        provider_factory: Arc<dyn ProviderFactory>,
        command_factory: Arc<dyn CommandFactory>,
        initial_bots: Vec<ChatBotSettings>,
    ) -> Self {
        Self {
            provider_factory,
            command_factory,
            dispatcher: OnceLock::new(),
            custom_command_handler: OnceLock::new(),
            providers: Mutex::new(HashMap::new()),
            mapped_channels: Mutex::new(ChannelTable::new()),
            tracking_contexts: Arc::new(Mutex::new(Vec::new())),
            coordination: Mutex::new(Coordination {
                ids: ChannelIdCounter::default(),
                connections_updated: RenewableSignal::new(),
            }),
            active_chat_bots: Mutex::new(initial_bots),
            started: AtomicBool::new(false),
            handler_cancel: CancellationToken::new(),
            chat_handler: Mutex::new(None),
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether [`start`](Self::start) has completed.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// The provider registered for `connection_id`.
    pub fn provider(&self, connection_id: ConnectionId) -> Option<BoxedProvider> {
        self.providers.lock().get(&connection_id).cloned()
    }

    /// Every mapped channel, ordered by synthetic id.
    pub fn channels(&self) -> Vec<ChannelRepresentation> {
        self.mapped_channels.lock().channels()
    }

    /// The mapping behind a synthetic channel id.
    pub fn mapping(&self, channel_id: ChannelId) -> Option<ChannelMapping> {
        self.mapped_channels.lock().get(channel_id).cloned()
    }

    /// Latest settings recorded for `connection_id`.
    pub fn settings(&self, connection_id: ConnectionId) -> Option<ChatBotSettings> {
        self.active_chat_bots
            .lock()
            .iter()
            .find(|bot| bot.id == connection_id)
            .cloned()
    }

    // =========================================================================
    // Settings and topology
    // =========================================================================

    /// Applies new settings for one connection.
    ///
    /// The live provider is kept when only the reconnection interval (or
    /// the channel list) changed; otherwise it is disconnected, dropped and,
    /// if the connection is enabled, replaced. Mappings of a replaced
    /// provider are dropped. After [`start`](Self::start), a replacement is
    /// connected and mapped and the merge loop is woken.
    pub async fn change_settings(
        &self,
        new_settings: ChatBotSettings,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let id = new_settings.id;
        let previous = self.settings(id);
        let live = self.provider(id);

        if let (Some(provider), Some(previous)) = (&live, &previous)
            && new_settings.enabled
            && previous.enabled
            && previous.same_connection(&new_settings)
        {
            if previous.reconnection_interval != new_settings.reconnection_interval {
                debug!(
                    connection_id = id,
                    minutes = new_settings.reconnection_interval,
                    "Updating reconnection interval"
                );
                provider.set_reconnect_interval(new_settings.reconnection_interval);
            }
            self.store_settings(new_settings);
            return Ok(());
        }

        let replacement = if new_settings.enabled {
            Some(self.provider_factory.create_provider(&new_settings)?)
        } else {
            None
        };

        let old = {
            let mut providers = self.providers.lock();
            let old = providers.remove(&id);
            if let Some(provider) = &replacement {
                providers.insert(id, provider.clone());
            }
            old
        };

        let notification = self.remove_mappings_and_notify(id, cancel);
        if let Some(old) = old {
            info!(connection_id = id, "Tearing down chat provider");
            disconnect_provider(id, &old, cancel).await?;
        }
        notification.await?;

        let channels = new_settings.channels.clone();
        self.store_settings(new_settings);

        if self.is_started() {
            if let Some(provider) = replacement {
                if provider.connect(cancel).await? {
                    if !channels.is_empty() {
                        self.change_channels(id, &channels, cancel).await?;
                    }
                } else {
                    warn!(connection_id = id, "Chat provider failed to connect");
                }
            }
            self.signal_connections_updated();
        }

        Ok(())
    }

    /// Remaps the channels of one connection.
    ///
    /// Unknown connection ids are ignored. If the provider is replaced
    /// while its channels are being mapped, the result is discarded.
    pub async fn change_channels(
        &self,
        connection_id: ConnectionId,
        new_channels: &[ChatChannelSettings],
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let Some(provider) = self.provider(connection_id) else {
            return Ok(());
        };

        // Trackings hear about the final list below.
        self.remove_mappings(connection_id);

        let results = provider.map_channels(new_channels, cancel).await?;
        if results.len() != new_channels.len() {
            return Err(ChatError::provider(format!(
                "provider mapped {} channels, expected {}",
                results.len(),
                new_channels.len()
            )));
        }

        let block = self.coordination.lock().ids.reserve(results.len());

        let notification = {
            let providers = self.providers.lock();
            if !providers
                .get(&connection_id)
                .is_some_and(|current| Arc::ptr_eq(current, &provider))
            {
                debug!(connection_id, "Provider replaced while mapping channels, discarding");
                return Ok(());
            }

            let mut table = self.mapped_channels.lock();
            for ((synthetic_id, settings), channel) in block.zip(new_channels).zip(results) {
                trace!(
                    connection = %channel.connection_name,
                    channel = %channel.friendly_name,
                    channel_id = synthetic_id,
                    "Mapping channel"
                );
                table.insert(
                    synthetic_id,
                    ChannelMapping {
                        provider_id: connection_id,
                        provider_channel_id: channel.real_id,
                        is_watchdog_channel: settings.is_watchdog_channel,
                        is_updates_channel: settings.is_updates_channel,
                        channel,
                    },
                );
            }
            self.capture_channel_update(&table, cancel)
        };

        {
            let mut bots = self.active_chat_bots.lock();
            if let Some(bot) = bots.iter_mut().find(|bot| bot.id == connection_id) {
                bot.channels = new_channels.to_vec();
            }
        }

        notification.await
    }

    /// Removes a connection: its provider, its settings and its mappings.
    pub async fn delete_connection(
        &self,
        connection_id: ConnectionId,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let provider = self.providers.lock().remove(&connection_id);
        self.active_chat_bots
            .lock()
            .retain(|bot| bot.id != connection_id);

        self.remove_mappings_and_notify(connection_id, cancel).await?;

        if let Some(provider) = provider {
            info!(connection_id, "Deleting chat connection");
            disconnect_provider(connection_id, &provider, cancel).await?;
            self.signal_connections_updated();
        }
        Ok(())
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Sends `text` to every listed channel, skipping ids that are no
    /// longer mapped or whose provider is gone.
    pub async fn send_message(
        &self,
        text: &str,
        channel_ids: &[ChannelId],
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        trace!(text = %text, channels = ?channel_ids, "Chat send");

        let targets: Vec<(BoxedProvider, ChannelId)> = {
            let providers = self.providers.lock();
            let table = self.mapped_channels.lock();
            channel_ids
                .iter()
                .filter_map(|id| table.get(*id))
                .filter_map(|mapping| {
                    providers
                        .get(&mapping.provider_id)
                        .map(|p| (p.clone(), mapping.provider_channel_id))
                })
                .collect()
        };

        let results = future::join_all(
            targets
                .iter()
                .map(|(provider, channel_id)| provider.send_message(*channel_id, text, cancel)),
        )
        .await;

        for result in results {
            match result {
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!(error = %e, "Chat send failed"),
                Ok(()) => {}
            }
        }
        Ok(())
    }

    /// Sends `text` to the watchdog channels.
    pub async fn send_watchdog_message(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let ids = self.mapped_channels.lock().watchdog_ids();
        self.send_message(&format!("{WATCHDOG_PREFIX}{text}"), &ids, cancel)
            .await
    }

    /// Sends `text` to the updates channels.
    pub async fn send_update_message(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let ids = self.mapped_channels.lock().updates_ids();
        self.send_message(&format!("{UPDATES_PREFIX}{text}"), &ids, cancel)
            .await
    }

    // =========================================================================
    // Custom commands
    // =========================================================================

    /// Registers the custom command handler. May only be called once.
    pub fn register_command_handler(
        &self,
        handler: Arc<dyn CustomCommandHandler>,
    ) -> ChatResult<()> {
        self.custom_command_handler
            .set(handler)
            .map_err(|_| ChatError::invalid_operation("register_command_handler() already called"))
    }

    /// Issues a tracking context seeded with the current channel list.
    pub fn create_tracking_context(&self) -> ChatResult<ChatTrackingContext> {
        let handler = self.custom_command_handler.get().cloned().ok_or_else(|| {
            ChatError::invalid_operation("register_command_handler() hasn't been called")
        })?;

        let shared = {
            let table = self.mapped_channels.lock();
            let shared = Arc::new(TrackingShared::new(handler, table.channels()));
            self.tracking_contexts.lock().push(shared.clone());
            shared
        };

        let registry = Arc::downgrade(&self.tracking_contexts);
        Ok(ChatTrackingContext::new(
            shared,
            Box::new(move |released: &Arc<TrackingShared>| {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().retain(|context| !Arc::ptr_eq(context, released));
                }
            }),
        ))
    }

    // =========================================================================
    // Start / stop
    // =========================================================================

    /// Registers built-in commands, builds and connects every enabled
    /// provider, maps their channels and spawns the merge loop.
    pub async fn start(self: &Arc<Self>, cancel: &CancellationToken) -> ChatResult<()> {
        self.dispatcher
            .set(CommandDispatcher::new(self.command_factory.generate_commands()))
            .map_err(|_| ChatError::invalid_operation("start() already called"))?;

        let bots = self.active_chat_bots.lock().clone();
        info!(count = bots.len(), "Starting chat manager");

        for bot in &bots {
            if let Err(e) = self.change_settings(bot.clone(), cancel).await {
                if e.is_cancelled() {
                    return Err(e);
                }
                warn!(connection_id = bot.id, error = %e, "Skipping chat connection");
            }
        }

        let providers: Vec<(ConnectionId, BoxedProvider)> = self
            .providers
            .lock()
            .iter()
            .map(|(id, p)| (*id, p.clone()))
            .collect();
        let connected = future::join_all(
            providers
                .iter()
                .map(|(_, provider)| provider.connect(cancel)),
        )
        .await;
        for ((id, _), result) in providers.iter().zip(connected) {
            match result {
                Ok(true) => debug!(connection_id = id, "Chat provider connected"),
                Ok(false) => warn!(connection_id = id, "Chat provider failed to connect"),
                Err(e) => return Err(e),
            }
        }

        let mapped = future::join_all(
            bots.iter()
                .filter(|bot| bot.enabled)
                .map(|bot| async move { (bot.id, self.change_channels(bot.id, &bot.channels, cancel).await) }),
        )
        .await;
        for (id, result) in mapped {
            match result {
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!(connection_id = id, error = %e, "Failed to map channels"),
                Ok(()) => {}
            }
        }

        let manager = self.clone();
        let handler_cancel = self.handler_cancel.clone();
        *self.chat_handler.lock() = Some(tokio::spawn(async move {
            manager.monitor_messages(handler_cancel).await;
        }));
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Stops the merge loop, waits for it, then disconnects every provider.
    pub async fn stop(&self, cancel: &CancellationToken) -> ChatResult<()> {
        self.handler_cancel.cancel();
        let handle = self.chat_handler.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "Message monitor task failed");
        }

        let providers: Vec<(ConnectionId, BoxedProvider)> = self
            .providers
            .lock()
            .iter()
            .map(|(id, p)| (*id, p.clone()))
            .collect();
        let results = future::join_all(
            providers
                .iter()
                .map(|(id, provider)| disconnect_provider(*id, provider, cancel)),
        )
        .await;
        info!("Chat manager stopped");
        results.into_iter().collect()
    }

    // =========================================================================
    // Merge loop
    // =========================================================================

    async fn monitor_messages(self: Arc<Self>, cancel: CancellationToken) {
        match self.run_message_loop(&cancel).await {
            Ok(()) | Err(ChatError::Cancelled) => trace!("Message processing loop cancelled"),
            Err(e) => error!(error = %e, "Message monitor crashed"),
        }
    }

    async fn run_message_loop(&self, cancel: &CancellationToken) -> ChatResult<()> {
        let mut pending: HashMap<ConnectionId, PendingMessage> = HashMap::new();

        while !cancel.is_cancelled() {
            let updated = self.coordination.lock().connections_updated.listen();

            // Registered providers without a read in flight may come back on
            // their own, so they are rechecked every idle interval.
            let has_idle = {
                let providers = self.providers.lock();
                pending.retain(|id, entry| {
                    entry.provider.connected()
                        && providers
                            .get(id)
                            .is_some_and(|current| Arc::ptr_eq(current, &entry.provider))
                });
                for (id, provider) in providers.iter() {
                    if provider.connected() && !pending.contains_key(id) {
                        let future = {
                            let provider = provider.clone();
                            let cancel = cancel.clone();
                            Box::pin(async move { provider.next_message(&cancel).await })
                        };
                        pending.insert(
                            *id,
                            PendingMessage {
                                provider: provider.clone(),
                                future,
                            },
                        );
                    }
                }
                providers.len() > pending.len()
            };

            if pending.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = updated.fired() => {}
                    _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                }
                continue;
            }

            let ready = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = updated.fired() => Vec::new(),
                _ = tokio::time::sleep(IDLE_POLL_INTERVAL), if has_idle => Vec::new(),
                ready = poll_ready(&mut pending) => ready,
            };

            for (id, provider, result) in ready {
                match result {
                    Ok(event) => match self.process_event(id, &provider, event, cancel).await {
                        Err(e) if e.is_cancelled() && !cancel.is_cancelled() => {
                            debug!(connection_id = id, "Chat dispatch cancelled");
                        }
                        other => other?,
                    },
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => warn!(connection_id = id, error = %e, "Chat provider read failed"),
                }
            }
        }

        Err(ChatError::Cancelled)
    }

    async fn process_event(
        &self,
        connection_id: ConnectionId,
        provider: &BoxedProvider,
        event: ProviderEvent,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        match event {
            ProviderEvent::Reconnected => {
                // Rejoins with the primary connection's channel list.
                let channels = self
                    .active_chat_bots
                    .lock()
                    .first()
                    .map(|bot| bot.channels.clone())
                    .unwrap_or_default();
                if channels.is_empty() {
                    return Ok(());
                }
                info!(connection_id, "Chat provider reconnected, remapping channels");
                match self.change_channels(connection_id, &channels, cancel).await {
                    Err(e) if !e.is_cancelled() => {
                        warn!(connection_id, error = %e, "Failed to remap channels");
                        Ok(())
                    }
                    other => other,
                }
            }
            ProviderEvent::Message(message) => {
                self.process_message(connection_id, provider, message, cancel)
                    .await
            }
        }
    }

    async fn process_message(
        &self,
        connection_id: ConnectionId,
        provider: &BoxedProvider,
        message: Message,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let Some(message) = self.resolve_channel(connection_id, provider, message) else {
            return Ok(());
        };
        let Some(dispatcher) = self.dispatcher.get() else {
            return Ok(());
        };

        let custom: Vec<BoxedCommand> = self
            .tracking_contexts
            .lock()
            .iter()
            .flat_map(|context| context.custom_commands())
            .collect();

        let reply = dispatcher
            .dispatch(&message, &provider.bot_mention(), &custom, cancel)
            .await?;
        if let Some(reply) = reply {
            self.send_message(&reply, &[message.user.channel.real_id], cancel)
                .await?;
        }
        Ok(())
    }

    /// Rewrites the message's channel to its synthetic identity, mapping
    /// unseen private channels on the way. Returns `None` if the message
    /// should be dropped.
    fn resolve_channel(
        &self,
        connection_id: ConnectionId,
        provider: &BoxedProvider,
        mut message: Message,
    ) -> Option<Message> {
        let providers = self.providers.lock();
        if !providers
            .get(&connection_id)
            .is_some_and(|current| Arc::ptr_eq(current, provider))
        {
            return None;
        }

        let mut table = self.mapped_channels.lock();
        let channel = &mut message.user.channel;
        let local_id = channel.real_id;

        if channel.is_private_channel {
            if !provider.connected() {
                return None;
            }
            let synthetic_id = match table.find(connection_id, local_id) {
                Some((id, _)) => id,
                None => {
                    let id = self.coordination.lock().ids.next_id();
                    trace!(
                        connection = %channel.connection_name,
                        user = %message.user.friendly_name,
                        channel_id = id,
                        "Mapping private channel"
                    );
                    table.insert(
                        id,
                        ChannelMapping {
                            provider_id: connection_id,
                            provider_channel_id: local_id,
                            is_watchdog_channel: false,
                            is_updates_channel: false,
                            channel: channel.clone(),
                        },
                    );
                    id
                }
            };
            channel.real_id = synthetic_id;
        } else {
            let Some((synthetic_id, mapping)) = table.find(connection_id, local_id) else {
                debug!(
                    connection_id,
                    channel = %channel.friendly_name,
                    "Ignoring message from unmapped channel"
                );
                return None;
            };
            channel.real_id = synthetic_id;
            channel.tag = mapping.channel.tag.clone();
            channel.is_admin_channel = mapping.channel.is_admin_channel;
        }

        Some(message)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn store_settings(&self, settings: ChatBotSettings) {
        let mut bots = self.active_chat_bots.lock();
        match bots.iter_mut().find(|bot| bot.id == settings.id) {
            Some(existing) => *existing = settings,
            None => bots.push(settings),
        }
    }

    /// Drops every mapping of `connection_id` without telling trackings.
    fn remove_mappings(&self, connection_id: ConnectionId) {
        unmap_connection(&mut self.mapped_channels.lock(), connection_id);
    }

    /// Drops every mapping of `connection_id` and returns the tracking
    /// notification for the shrunken table.
    fn remove_mappings_and_notify(
        &self,
        connection_id: ConnectionId,
        cancel: &CancellationToken,
    ) -> Notification {
        let mut table = self.mapped_channels.lock();
        unmap_connection(&mut table, connection_id);
        self.capture_channel_update(&table, cancel)
    }

    /// Pushes the table's channel list into every tracking context and
    /// returns the sink notifications to await.
    fn capture_channel_update(&self, table: &ChannelTable, cancel: &CancellationToken) -> Notification {
        let channels = table.channels();
        let updates: Vec<_> = self
            .tracking_contexts
            .lock()
            .iter()
            .map(|context| context.update_channels(channels.clone(), cancel.clone()))
            .collect();
        Box::pin(async move {
            future::join_all(updates)
                .await
                .into_iter()
                .collect::<ChatResult<()>>()
        })
    }

    fn signal_connections_updated(&self) {
        self.coordination.lock().connections_updated.fire();
    }
}

#[async_trait]
impl RestartHandler for ChatManager {
    async fn handle_restart(
        &self,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> ChatResult<()> {
        let text = match version {
            Some(version) => format!("TGS: Updating to version {version}..."),
            None => "TGS: Restart requested...".to_owned(),
        };
        let ids = self.mapped_channels.lock().watchdog_ids();
        self.send_message(&text, &ids, cancel).await
    }
}

impl std::fmt::Debug for ChatManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatManager")
            .field("started", &self.is_started())
            .field("providers", &self.providers.lock().len())
            .field("channels", &self.mapped_channels.lock().len())
            .finish_non_exhaustive()
    }
}

fn unmap_connection(table: &mut ChannelTable, connection_id: ConnectionId) {
    let removed = table.remove_connection(connection_id);
    if removed > 0 {
        trace!(connection_id, removed, "Removed channel mappings");
    }
}

/// Disconnects a provider, logging anything but cancellation.
async fn disconnect_provider(
    connection_id: ConnectionId,
    provider: &BoxedProvider,
    cancel: &CancellationToken,
) -> ChatResult<()> {
    match provider.disconnect(cancel).await {
        Err(e) if !e.is_cancelled() => {
            warn!(connection_id, error = %e, "Chat provider disconnect failed");
            Ok(())
        }
        other => other,
    }
}

/// Resolves with every pending read that is ready, removing them from
/// `pending`. Polling all entries each wake keeps one busy provider from
/// starving the rest.
fn poll_ready(
    pending: &mut HashMap<ConnectionId, PendingMessage>,
) -> impl Future<Output = Vec<(ConnectionId, BoxedProvider, ChatResult<ProviderEvent>)>> + '_ {
    future::poll_fn(move |cx| {
        let mut finished = Vec::new();
        for (id, entry) in pending.iter_mut() {
            if let Poll::Ready(result) = entry.future.as_mut().poll(cx) {
                finished.push((*id, result));
            }
        }
        if finished.is_empty() {
            return Poll::Pending;
        }
        Poll::Ready(
            finished
                .into_iter()
                .filter_map(|(id, result)| {
                    pending
                        .remove(&id)
                        .map(|entry| (id, entry.provider, result))
                })
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests;
