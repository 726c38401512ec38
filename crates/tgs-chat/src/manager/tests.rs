use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tgs_core::{
    CancellationToken, ChannelRepresentation, ChatBotSettings, ChatChannelSettings, ChatError,
    ChatProviderKind, ChatResult, ChatUser, CustomCommandHandler, Provider, ProviderEvent,
    RestartHandler,
};

use super::ChatManager;
use crate::builtin::{BuiltinCommandFactory, CommandInvocation, FnCommand};
use crate::dispatch::{ADMIN_ONLY_REJECTION, UNKNOWN_COMMAND};
use crate::testing::{ScriptedFactory, ScriptedProvider};
use crate::tracking::{ChannelSink, CustomCommandSpec};

fn bot(id: i64, channels: Vec<ChatChannelSettings>) -> ChatBotSettings {
    ChatBotSettings::new(id, ChatProviderKind::Irc, format!("irc{id}.example.org;6667;tgs;false;;"))
        .with_channels(channels)
}

fn commands() -> BuiltinCommandFactory {
    BuiltinCommandFactory::new()
        .with_command(FnCommand::new("STATUS", "Shows status", |_: CommandInvocation| async {
            Ok(Some("Online".to_owned()))
        }))
        .with_command(
            FnCommand::new("RESTART", "Restarts the server", |_: CommandInvocation| async {
                Ok(Some("Restarting...".to_owned()))
            })
            .admin_only(),
        )
}

fn manager(bots: Vec<ChatBotSettings>) -> (Arc<ChatManager>, Arc<ScriptedFactory>) {
    let factory = Arc::new(ScriptedFactory::default());
    let manager = Arc::new(ChatManager::new(factory.clone(), Arc::new(commands()), bots));
    (manager, factory)
}

async fn started(bots: Vec<ChatBotSettings>) -> (Arc<ChatManager>, Arc<ScriptedFactory>) {
    let (manager, factory) = manager(bots);
    manager.start(&CancellationToken::new()).await.unwrap();
    (manager, factory)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn ids_for(manager: &ChatManager, connection_id: i64) -> Vec<u64> {
    manager.mapped_channels.lock().ids_for(connection_id)
}

struct EchoHandler;

#[async_trait]
impl CustomCommandHandler for EchoHandler {
    async fn handle_chat_command(
        &self,
        name: &str,
        arguments: &str,
        _user: &ChatUser,
        _cancel: &CancellationToken,
    ) -> ChatResult<Option<String>> {
        Ok(Some(format!("custom:{name}:{arguments}")))
    }
}

#[derive(Default)]
struct CountingSink {
    sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl ChannelSink for CountingSink {
    async fn update_channels(
        &self,
        channels: Vec<ChannelRepresentation>,
        _cancel: &CancellationToken,
    ) -> ChatResult<()> {
        self.sizes.lock().push(channels.len());
        Ok(())
    }
}

// =============================================================================
// Start / stop and settings
// =============================================================================

#[tokio::test]
async fn test_start_maps_channels_in_order() {
    let channels = vec![
        ChatChannelSettings::irc("#ops").watchdog().admin().with_tag("ops"),
        ChatChannelSettings::irc("#news;key").updates(),
        ChatChannelSettings::irc("#lobby"),
    ];
    let (manager, factory) = started(vec![bot(1, channels.clone())]).await;
    let provider = factory.latest(1).unwrap();

    assert!(manager.is_started());
    assert!(provider.connected());

    let mapped = manager.channels();
    let names: Vec<_> = mapped.iter().map(|c| c.friendly_name.as_str()).collect();
    assert_eq!(names, vec!["#ops", "#news", "#lobby"]);

    let ids = ids_for(&manager, 1);
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
    for (id, settings) in ids.iter().zip(&channels) {
        let mapping = manager.mapping(*id).unwrap();
        assert_eq!(mapping.channel.real_id, *id);
        assert_eq!(mapping.is_watchdog_channel, settings.is_watchdog_channel);
        assert_eq!(mapping.is_updates_channel, settings.is_updates_channel);
        assert_eq!(mapping.channel.is_admin_channel, settings.is_admin_channel);
        assert_eq!(mapping.channel.tag, settings.tag);
        assert_eq!(
            Some(mapping.provider_channel_id),
            provider.local_id(settings.irc_channel_name().unwrap())
        );
    }
}

#[tokio::test]
async fn test_start_twice_is_invalid() {
    let (manager, _) = started(vec![]).await;
    let err = manager.start(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_start_skips_unbuildable_connections() {
    let mut broken = bot(2, vec![]);
    broken.connection_string.clear();
    let (manager, factory) = started(vec![bot(1, vec![]), broken]).await;
    assert!(manager.provider(1).is_some());
    assert!(manager.provider(2).is_none());
    assert_eq!(factory.built_count(2), 0);
}

#[tokio::test]
async fn test_enabled_toggle_tracks_registry() {
    let cancel = CancellationToken::new();
    let (manager, factory) = manager(vec![]);

    manager.change_settings(bot(1, vec![]), &cancel).await.unwrap();
    let before_start = factory.latest(1).unwrap();
    assert!(manager.provider(1).is_some());
    assert!(!before_start.connected());

    manager.start(&cancel).await.unwrap();
    assert!(manager.provider(1).unwrap().connected());
    assert_eq!(factory.built_count(1), 1);

    manager
        .change_settings(bot(1, vec![]).with_enabled(false), &cancel)
        .await
        .unwrap();
    assert!(manager.provider(1).is_none());
    assert_eq!(before_start.disconnect_calls.load(Ordering::SeqCst), 1);

    manager.change_settings(bot(1, vec![]), &cancel).await.unwrap();
    assert!(manager.provider(1).unwrap().connected());
    assert_eq!(factory.built_count(1), 2);
}

#[tokio::test]
async fn test_interval_change_keeps_provider() {
    let cancel = CancellationToken::new();
    let (manager, factory) = started(vec![bot(1, vec![ChatChannelSettings::irc("#a")])]).await;
    let ids = ids_for(&manager, 1);

    manager
        .change_settings(
            bot(1, vec![ChatChannelSettings::irc("#a")]).with_reconnection_interval(5),
            &cancel,
        )
        .await
        .unwrap();

    let provider = factory.latest(1).unwrap();
    assert_eq!(factory.built_count(1), 1);
    assert_eq!(provider.reconnect_interval.load(Ordering::SeqCst), 5);
    assert_eq!(provider.disconnect_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ids_for(&manager, 1), ids);
}

#[tokio::test]
async fn test_connection_change_rebuilds_and_remaps() {
    let cancel = CancellationToken::new();
    let (manager, factory) = started(vec![bot(1, vec![ChatChannelSettings::irc("#a")])]).await;
    let old = factory.latest(1).unwrap();
    let old_ids = ids_for(&manager, 1);

    let mut changed = bot(1, vec![ChatChannelSettings::irc("#b")]);
    changed.connection_string = "other.example.org;6697;tgs;true;;".into();
    manager.change_settings(changed, &cancel).await.unwrap();

    let new = factory.latest(1).unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert_eq!(old.disconnect_calls.load(Ordering::SeqCst), 1);
    assert!(new.connected());

    let new_ids = ids_for(&manager, 1);
    assert_eq!(new_ids.len(), 1);
    assert!(old_ids.iter().all(|id| !new_ids.contains(id)));
    assert_eq!(manager.channels()[0].friendly_name, "#b");
}

#[tokio::test]
async fn test_stop_disconnects_after_loop() {
    let cancel = CancellationToken::new();
    let (manager, factory) = started(vec![bot(1, vec![]), bot(2, vec![])]).await;
    manager.stop(&cancel).await.unwrap();

    assert!(manager.chat_handler.lock().is_none());
    for id in [1, 2] {
        let provider = factory.latest(id).unwrap();
        assert_eq!(provider.disconnect_calls.load(Ordering::SeqCst), 1);
        assert!(!provider.connected());
    }
}

// =============================================================================
// Channel identity
// =============================================================================

#[tokio::test]
async fn test_private_channel_ids_are_stable() {
    let (manager, factory) = started(vec![bot(1, vec![])]).await;
    let provider = factory.latest(1).unwrap();

    provider.say_privately("dave", 500, "status");
    provider.say_privately("dave", 500, "status");
    provider.say_privately("erin", 501, "status");
    let sent = provider.wait_for_sent(3).await;

    assert_eq!(
        sent,
        vec![
            (500, "Online".to_owned()),
            (500, "Online".to_owned()),
            (501, "Online".to_owned()),
        ]
    );

    let ids = ids_for(&manager, 1);
    assert_eq!(ids.len(), 2);
    let dave = manager.mapping(ids[0]).unwrap();
    assert_eq!(dave.provider_channel_id, 500);
    assert!(dave.channel.is_private_channel);
    assert_eq!(dave.channel.friendly_name, "PM: dave");
    assert!(!dave.is_watchdog_channel);
}

#[tokio::test]
async fn test_change_channels_discarded_when_provider_replaced() {
    let cancel = CancellationToken::new();
    let (manager, factory) = started(vec![bot(1, vec![ChatChannelSettings::irc("#a")])]).await;
    let old = factory.latest(1).unwrap();
    let gate = old.gate_mapping();

    let remap = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .change_channels(
                    1,
                    &[ChatChannelSettings::irc("#x"), ChatChannelSettings::irc("#y")],
                    &CancellationToken::new(),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut rebuilt = bot(1, vec![ChatChannelSettings::irc("#z")]);
    rebuilt.connection_string = "replacement.example.org;6667;tgs;false;;".into();
    manager.change_settings(rebuilt, &cancel).await.unwrap();

    gate.notify_one();
    remap.await.unwrap().unwrap();

    let names: Vec<_> = manager.channels().into_iter().map(|c| c.friendly_name).collect();
    assert_eq!(names, vec!["#z"]);
    let ids = ids_for(&manager, 1);
    let mapping = manager.mapping(ids[0]).unwrap();
    assert_eq!(
        Some(mapping.provider_channel_id),
        factory.latest(1).unwrap().local_id("#z")
    );
    assert_eq!(
        manager.settings(1).unwrap().channels,
        vec![ChatChannelSettings::irc("#z")]
    );
}

#[tokio::test]
async fn test_reconnect_remaps_with_primary_channels() {
    let (manager, factory) = started(vec![
        bot(1, vec![ChatChannelSettings::irc("#a"), ChatChannelSettings::irc("#b")]),
        bot(2, vec![ChatChannelSettings::irc("#c")]),
    ])
    .await;
    let primary_ids = ids_for(&manager, 1);
    let primary_mapping = manager.mapping(primary_ids[0]).unwrap();
    let second_ids = ids_for(&manager, 2);
    assert_eq!(second_ids.len(), 1);

    let second = factory.latest(2).unwrap();
    second.push(ProviderEvent::Reconnected);
    wait_until(|| {
        let ids = ids_for(&manager, 2);
        ids.len() == 2 && ids.iter().all(|id| !second_ids.contains(id))
    })
    .await;

    let names: Vec<_> = ids_for(&manager, 2)
        .into_iter()
        .map(|id| manager.mapping(id).unwrap().channel.friendly_name)
        .collect();
    assert_eq!(names, vec!["#a", "#b"]);
    assert!(second.local_id("#a").is_some());
    assert!(second.local_id("#c").is_none());

    assert_eq!(ids_for(&manager, 1), primary_ids);
    assert_eq!(manager.mapping(primary_ids[0]).unwrap(), primary_mapping);
}

#[tokio::test]
async fn test_delete_connection_removes_only_its_mappings() {
    let cancel = CancellationToken::new();
    let (manager, factory) =
        started(vec![bot(1, vec![]), bot(2, vec![ChatChannelSettings::irc("#c")])]).await;
    let doomed = factory.latest(1).unwrap();

    doomed.say_privately("dave", 500, "status");
    doomed.say_privately("erin", 501, "status");
    doomed.wait_for_sent(2).await;
    let private_ids = ids_for(&manager, 1);
    assert_eq!(private_ids.len(), 2);
    let survivors = ids_for(&manager, 2);

    manager.delete_connection(1, &cancel).await.unwrap();

    assert!(ids_for(&manager, 1).is_empty());
    assert_eq!(ids_for(&manager, 2), survivors);
    assert!(manager.provider(1).is_none());
    assert!(manager.settings(1).is_none());
    assert_eq!(doomed.disconnect_calls.load(Ordering::SeqCst), 1);

    manager.send_message("hello?", &private_ids, &cancel).await.unwrap();
    assert_eq!(doomed.sent().len(), 2);
}

// =============================================================================
// Dispatch through the merge loop
// =============================================================================

#[tokio::test]
async fn test_help_unknown_and_admin_gating() {
    let (_manager, factory) = started(vec![bot(
        1,
        vec![ChatChannelSettings::irc("#pub"), ChatChannelSettings::irc("#admin").admin()],
    )])
    .await;
    let provider = factory.latest(1).unwrap();
    let public = provider.local_id("#pub").unwrap();
    let admin = provider.local_id("#admin").unwrap();

    provider.say_in_channel(public, "!tgs help");
    let sent = provider.wait_for_sent(1).await;
    assert_eq!(sent[0].0, public);
    assert!(sent[0].1.contains("STATUS"));
    assert!(sent[0].1.contains("RESTART"));

    provider.say_in_channel(public, "!tgs bogus");
    provider.say_in_channel(public, "tgsbot: restart");
    provider.say_in_channel(admin, "tgsbot, restart");
    let sent = provider.wait_for_sent(4).await;
    assert_eq!(sent[1], (public, UNKNOWN_COMMAND.to_owned()));
    assert_eq!(sent[2], (public, ADMIN_ONLY_REJECTION.to_owned()));
    assert_eq!(sent[3], (admin, "Restarting...".to_owned()));
}

#[tokio::test]
async fn test_unaddressed_and_unmapped_are_ignored() {
    let (_manager, factory) = started(vec![bot(1, vec![ChatChannelSettings::irc("#pub")])]).await;
    let provider = factory.latest(1).unwrap();
    let public = provider.local_id("#pub").unwrap();

    provider.say_in_channel(public, "just chatting");
    provider.say_in_channel(9999, "!tgs status");
    provider.say_in_channel(public, "!tgs");
    let sent = provider.wait_for_sent(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(sent, vec![(public, "Hi!".to_owned())]);
    assert_eq!(provider.sent().len(), 1);
}

#[tokio::test]
async fn test_messages_from_each_provider_are_served() {
    let (_manager, factory) = started(vec![
        bot(1, vec![ChatChannelSettings::irc("#a")]),
        bot(2, vec![ChatChannelSettings::irc("#b")]),
    ])
    .await;
    let first = factory.latest(1).unwrap();
    let second = factory.latest(2).unwrap();

    for _ in 0..3 {
        first.say_in_channel(first.local_id("#a").unwrap(), "!tgs status");
        second.say_in_channel(second.local_id("#b").unwrap(), "!tgs status");
    }
    assert_eq!(first.wait_for_sent(3).await.len(), 3);
    assert_eq!(second.wait_for_sent(3).await.len(), 3);
}

#[tokio::test]
async fn test_cancelled_command_keeps_loop_alive() {
    let factory = Arc::new(ScriptedFactory::default());
    let commands = commands().with_command(FnCommand::new(
        "ABORT",
        "Gives up",
        |_: CommandInvocation| async { Err(ChatError::Cancelled) },
    ));
    let manager = Arc::new(ChatManager::new(
        factory.clone(),
        Arc::new(commands),
        vec![bot(1, vec![ChatChannelSettings::irc("#a")])],
    ));
    manager.start(&CancellationToken::new()).await.unwrap();
    let provider = factory.latest(1).unwrap();
    let channel = provider.local_id("#a").unwrap();

    provider.say_in_channel(channel, "!tgs abort");
    provider.say_in_channel(channel, "!tgs status");

    let sent = provider.wait_for_sent(1).await;
    assert_eq!(sent, vec![(channel, "Online".to_owned())]);
    assert!(!manager.chat_handler.lock().as_ref().unwrap().is_finished());
}

#[tokio::test]
async fn test_provider_back_online_is_read_again() {
    let (_manager, factory) = started(vec![
        bot(1, vec![ChatChannelSettings::irc("#a")]),
        bot(2, vec![ChatChannelSettings::irc("#b")]),
    ])
    .await;
    let flaky = factory.latest(1).unwrap();
    let steady = factory.latest(2).unwrap();
    let flaky_channel = flaky.local_id("#a").unwrap();
    let steady_channel = steady.local_id("#b").unwrap();

    flaky.set_connected(false);
    steady.say_in_channel(steady_channel, "!tgs status");
    steady.wait_for_sent(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    flaky.set_connected(true);
    flaky.say_in_channel(flaky_channel, "!tgs status");
    assert_eq!(
        flaky.wait_for_sent(1).await,
        vec![(flaky_channel, "Online".to_owned())]
    );
}

// =============================================================================
// Tracking contexts and custom commands
// =============================================================================

#[tokio::test]
async fn test_tracking_context_requires_handler() {
    let (manager, _) = manager(vec![]);
    assert!(matches!(
        manager.create_tracking_context(),
        Err(ChatError::InvalidOperation(_))
    ));

    manager.register_command_handler(Arc::new(EchoHandler)).unwrap();
    assert!(matches!(
        manager.register_command_handler(Arc::new(EchoHandler)),
        Err(ChatError::InvalidOperation(_))
    ));
    assert!(manager.create_tracking_context().is_ok());
}

#[tokio::test]
async fn test_custom_commands_follow_context_lifetime() {
    let (manager, factory) = started(vec![bot(1, vec![ChatChannelSettings::irc("#a")])]).await;
    manager.register_command_handler(Arc::new(EchoHandler)).unwrap();
    let provider = factory.latest(1).unwrap();
    let channel = provider.local_id("#a").unwrap();

    let context = manager.create_tracking_context().unwrap();
    assert_eq!(context.channels().len(), 1);
    context.set_custom_commands(vec![CustomCommandSpec::new("deploy", "Deploys the game")]);

    provider.say_in_channel(channel, "!tgs deploy now please");
    provider.say_in_channel(channel, "!tgs ?");
    let sent = provider.wait_for_sent(2).await;
    assert_eq!(sent[0].1, "custom:deploy:now please");
    assert!(sent[1].1.ends_with("VERSION, STATUS, RESTART, deploy"));

    drop(context);
    assert!(manager.tracking_contexts.lock().is_empty());

    provider.say_in_channel(channel, "!tgs deploy");
    let sent = provider.wait_for_sent(3).await;
    assert_eq!(sent[2].1, UNKNOWN_COMMAND);
}

#[tokio::test]
async fn test_tracking_contexts_are_scoped_per_manager() {
    let (first, _) = manager(vec![]);
    let (second, _) = manager(vec![]);
    first.register_command_handler(Arc::new(EchoHandler)).unwrap();
    second.register_command_handler(Arc::new(EchoHandler)).unwrap();

    let kept = first.create_tracking_context().unwrap();
    let dropped = first.create_tracking_context().unwrap();
    let other = second.create_tracking_context().unwrap();

    drop(dropped);
    assert_eq!(first.tracking_contexts.lock().len(), 1);
    assert_eq!(second.tracking_contexts.lock().len(), 1);

    drop(kept);
    assert!(first.tracking_contexts.lock().is_empty());
    assert_eq!(second.tracking_contexts.lock().len(), 1);
    drop(other);
}

#[tokio::test]
async fn test_tracking_context_sees_channel_changes() {
    let cancel = CancellationToken::new();
    let (manager, _) = started(vec![bot(1, vec![ChatChannelSettings::irc("#a")])]).await;
    manager.register_command_handler(Arc::new(EchoHandler)).unwrap();
    let context = manager.create_tracking_context().unwrap();
    let sink = Arc::new(CountingSink::default());
    context.set_channel_sink(sink.clone(), &cancel).await.unwrap();

    manager
        .change_channels(
            1,
            &[ChatChannelSettings::irc("#a"), ChatChannelSettings::irc("#b")],
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(context.channels().len(), 2);

    manager.delete_connection(1, &cancel).await.unwrap();
    assert!(context.channels().is_empty());
    assert_eq!(*sink.sizes.lock(), vec![1, 2, 0]);
}

// =============================================================================
// Broadcasts
// =============================================================================

#[tokio::test]
async fn test_role_broadcasts_and_restart_notice() {
    let cancel = CancellationToken::new();
    let (manager, factory) = started(vec![bot(
        1,
        vec![
            ChatChannelSettings::irc("#wd").watchdog(),
            ChatChannelSettings::irc("#up").updates(),
            ChatChannelSettings::irc("#quiet"),
        ],
    )])
    .await;
    let provider = factory.latest(1).unwrap();
    let wd = provider.local_id("#wd").unwrap();
    let up = provider.local_id("#up").unwrap();

    manager.send_watchdog_message("server crashed", &cancel).await.unwrap();
    manager.send_update_message("deployed", &cancel).await.unwrap();
    manager.handle_restart(None, &cancel).await.unwrap();
    manager.handle_restart(Some("6.1.0"), &cancel).await.unwrap();

    assert_eq!(
        provider.sent(),
        vec![
            (wd, "WD: server crashed".to_owned()),
            (up, "DM: deployed".to_owned()),
            (wd, "TGS: Restart requested...".to_owned()),
            (wd, "TGS: Updating to version 6.1.0...".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_failed_connect_leaves_provider_registered_but_idle() {
    let cancel = CancellationToken::new();
    let (manager, factory) = manager(vec![]);
    manager.change_settings(bot(1, vec![]), &cancel).await.unwrap();
    let provider: Arc<ScriptedProvider> = factory.latest(1).unwrap();
    provider.fail_connects();

    manager.start(&cancel).await.unwrap();
    assert_eq!(provider.connect_calls.load(Ordering::SeqCst), 1);
    assert!(!provider.connected());
    assert!(manager.provider(1).is_some());
    manager.stop(&cancel).await.unwrap();
}
