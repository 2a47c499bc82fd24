use std::{collections::HashMap, sync::Arc};

use flume::Sender;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    audio::{
        backend::BackendKind,
        commands::{AudioCommand, CommandOutcome},
        config::EngineConfig,
        error::PlayerError,
        favorites::FavoritesStore,
        player::PlayerStateMachine,
        state::PlayerState,
        track::Track,
        traits::{ChannelHandle, GuildId, VoiceConnector},
    },
    event::events::Event,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Started,
    /// 1-based position in the pending queue.
    Queued { position: usize },
}

/// At most one player per guild. Players are created and evicted explicitly.
pub struct PlayerRegistry {
    connector: Arc<dyn VoiceConnector>,
    config: EngineConfig,
    events: Option<Sender<Event>>,
    players: Mutex<HashMap<GuildId, Arc<PlayerStateMachine>>>,
}

impl PlayerRegistry {
    pub fn new(connector: Arc<dyn VoiceConnector>, config: EngineConfig) -> Self {
        Self {
            connector,
            config,
            events: None,
            players: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_events(mut self, events: Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn get(&self, guild: GuildId) -> Result<Arc<PlayerStateMachine>, PlayerError> {
        self.players
            .lock()
            .await
            .get(&guild)
            .cloned()
            .ok_or(PlayerError::NoActivePlayer)
    }

    /// Returns the guild's player if it already uses `kind`. A player of the
    /// other kind is destroyed and replaced.
    pub async fn get_or_create(&self, guild: GuildId, kind: BackendKind) -> Arc<PlayerStateMachine> {
        let mut players = self.players.lock().await;

        if let Some(existing) = players.get(&guild) {
            if existing.kind() == kind {
                return existing.clone();
            }
            info!(guild = %guild, from = %existing.kind(), to = %kind, "player_replaced");
            existing.destroy().await;
        }

        let backend = kind.build(self.connector.clone(), &self.config);
        let player = Arc::new(PlayerStateMachine::new(guild, backend, self.events.clone()));
        players.insert(guild, player.clone());
        debug!(guild = %guild, backend = %kind, players = players.len(), "player_registered");
        player
    }

    pub async fn evict(&self, guild: GuildId) -> bool {
        let removed = self.players.lock().await.remove(&guild);
        match removed {
            Some(player) => {
                player.destroy().await;
                info!(guild = %guild, "player_evicted");
                true
            }
            None => false,
        }
    }

    pub async fn shutdown(&self) {
        let players: Vec<_> = self.players.lock().await.drain().map(|(_, p)| p).collect();
        let count = players.len();
        join_all(players.iter().map(|player| player.destroy())).await;
        info!(count, "registry_shutdown");
    }

    pub async fn len(&self) -> usize {
        self.players.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.lock().await.is_empty()
    }

    pub async fn request(
        &self,
        guild: GuildId,
        channel: &ChannelHandle,
        track: Track,
    ) -> Result<RequestOutcome, PlayerError> {
        if track.exceeds(self.config.max_track_duration) {
            return Err(PlayerError::InvalidTrack(format!(
                "{:?} is longer than {}s",
                track.title(),
                self.config.max_track_duration.as_secs()
            )));
        }

        let player = self.get_or_create(guild, BackendKind::for_track(&track)).await;
        if !player.status().is_connected_to(channel) {
            player.connect(channel).await?;
        }

        player.enqueue(track).await?;
        if player.state() != PlayerState::Stopped {
            return Ok(RequestOutcome::Queued {
                position: player.status().queue.len(),
            });
        }

        match player.play().await {
            Ok(()) => Ok(RequestOutcome::Started),
            // Someone else started playback between the check and `play`.
            Err(PlayerError::InvalidState { .. }) => Ok(RequestOutcome::Queued {
                position: player.status().queue.len(),
            }),
            Err(err) => Err(err),
        }
    }

    pub async fn request_favorite(
        &self,
        guild: GuildId,
        channel: &ChannelHandle,
        favorites: &dyn FavoritesStore,
        title: &str,
    ) -> Result<RequestOutcome, PlayerError> {
        let track = favorites
            .get_by_title(title)
            .ok_or_else(|| PlayerError::FavoriteNotFound(title.to_owned()))?;
        self.request(guild, channel, track).await
    }

    pub async fn dispatch(
        &self,
        guild: GuildId,
        cmd: AudioCommand,
    ) -> Result<CommandOutcome, PlayerError> {
        self.get(guild).await?.handle_command(cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{FakeConnector, SessionCall};

    fn registry(connector: &Arc<FakeConnector>) -> PlayerRegistry {
        PlayerRegistry::new(connector.clone(), EngineConfig::default())
    }

    fn remote(title: &str) -> Track {
        Track::remote(title, format!("https://example.com/{title}"), 120).unwrap()
    }

    #[tokio::test]
    async fn unknown_guild_has_no_player() {
        let registry = registry(&FakeConnector::new());

        assert!(matches!(
            registry.get(GuildId(9)).await,
            Err(PlayerError::NoActivePlayer)
        ));
        assert_eq!(
            registry.dispatch(GuildId(9), AudioCommand::Pause).await,
            Err(PlayerError::NoActivePlayer)
        );
    }

    #[tokio::test]
    async fn same_kind_reuses_player() {
        let registry = registry(&FakeConnector::new());

        let first = registry.get_or_create(GuildId(1), BackendKind::RemoteStream).await;
        let second = registry.get_or_create(GuildId(1), BackendKind::RemoteStream).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn other_kind_replaces_player() {
        let connector = FakeConnector::new();
        let registry = registry(&connector);
        let channel = ChannelHandle::new("voice");

        registry.request(GuildId(1), &channel, remote("a")).await.unwrap();
        let old = registry.get(GuildId(1)).await.unwrap();

        let replacement = registry.get_or_create(GuildId(1), BackendKind::LocalFile).await;

        assert_eq!(replacement.kind(), BackendKind::LocalFile);
        assert_eq!(old.play().await, Err(PlayerError::NoActivePlayer));
        assert!(connector.session(0).calls().contains(&SessionCall::Close));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn request_starts_then_queues() {
        let connector = FakeConnector::new();
        let registry = registry(&connector);
        let channel = ChannelHandle::new("voice");

        assert_eq!(
            registry.request(GuildId(1), &channel, remote("a")).await,
            Ok(RequestOutcome::Started)
        );
        assert_eq!(
            registry.request(GuildId(1), &channel, remote("b")).await,
            Ok(RequestOutcome::Queued { position: 1 })
        );
        assert_eq!(connector.connects(), 1);

        let status = registry.get(GuildId(1)).await.unwrap().status();
        assert_eq!(status.current.as_ref().map(Track::title), Some("a"));
    }

    #[tokio::test]
    async fn request_to_other_channel_reconnects() {
        let connector = FakeConnector::new();
        let registry = registry(&connector);

        registry
            .request(GuildId(1), &ChannelHandle::new("one"), remote("a"))
            .await
            .unwrap();
        registry
            .request(GuildId(1), &ChannelHandle::new("two"), remote("b"))
            .await
            .unwrap();

        assert_eq!(connector.connects(), 2);
        let status = registry.get(GuildId(1)).await.unwrap().status();
        assert_eq!(status.channel, Some(ChannelHandle::new("two")));
    }

    #[tokio::test]
    async fn failed_connect_is_reported() {
        let connector = FakeConnector::new();
        let registry = registry(&connector);
        connector.fail_next(true);

        let result = registry
            .request(GuildId(1), &ChannelHandle::new("gone"), remote("a"))
            .await;

        assert!(matches!(result, Err(PlayerError::Connect(_))));
    }

    #[tokio::test]
    async fn overlong_tracks_are_rejected() {
        let registry = registry(&FakeConnector::new());
        let long = Track::remote("long", "https://example.com/long", 7200).unwrap();

        let result = registry
            .request(GuildId(1), &ChannelHandle::new("voice"), long)
            .await;

        assert!(matches!(result, Err(PlayerError::InvalidTrack(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn evict_and_shutdown_destroy_players() {
        let connector = FakeConnector::new();
        let registry = registry(&connector);
        registry.get_or_create(GuildId(1), BackendKind::RemoteStream).await;
        registry.get_or_create(GuildId(2), BackendKind::LocalFile).await;

        assert!(registry.evict(GuildId(1)).await);
        assert!(!registry.evict(GuildId(1)).await);
        assert_eq!(registry.len().await, 1);

        let survivor = registry.get(GuildId(2)).await.unwrap();
        registry.shutdown().await;

        assert!(registry.is_empty().await);
        assert_eq!(survivor.pause().await, Err(PlayerError::NoActivePlayer));
    }
}
