mod support;

use std::time::Duration;

use support::{ScriptedConnector, next_event};
use voxqueue::{
    AudioCommand, AudioInput, BackendKind, ChannelHandle, CommandOutcome, EngineConfig, Event,
    FavoritesStore, GuildId, JsonFavoritesStore, PlaybackError, PlayerError, PlayerRegistry,
    PlayerState, RequestOutcome, Track,
};

const GUILD: GuildId = GuildId(42);

fn registry(connector: &std::sync::Arc<ScriptedConnector>) -> (PlayerRegistry, flume::Receiver<Event>) {
    let (tx, rx) = flume::unbounded();
    let config = EngineConfig {
        favorites_path: std::env::temp_dir().join("voxqueue-unused.json"),
        ..EngineConfig::default()
    };
    (PlayerRegistry::new(connector.clone(), config).with_events(tx), rx)
}

fn remote(title: &str, secs: u64) -> Track {
    Track::remote(title, format!("https://cdn.example.com/{title}.mp3"), secs).unwrap()
}

fn started(title: &'static str) -> impl Fn(&Event) -> bool {
    move |event| matches!(event, Event::TrackStarted { track, .. } if track.title() == title)
}

#[tokio::test]
async fn queued_tracks_play_back_to_back() {
    let connector = ScriptedConnector::new();
    let (registry, events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");

    assert_eq!(
        registry.request(GUILD, &channel, remote("one", 30)).await,
        Ok(RequestOutcome::Started)
    );
    assert_eq!(
        registry.request(GUILD, &channel, remote("two", 30)).await,
        Ok(RequestOutcome::Queued { position: 1 })
    );
    assert_eq!(
        registry.request(GUILD, &channel, remote("three", 30)).await,
        Ok(RequestOutcome::Queued { position: 2 })
    );
    next_event(&events, started("one")).await;

    let session = connector.latest();
    session.end_stream(None);
    next_event(&events, started("two")).await;

    registry.dispatch(GUILD, AudioCommand::Skip).await.unwrap();
    next_event(&events, started("three")).await;

    session.end_stream(None);
    next_event(&events, |e| matches!(e, Event::QueueEnded { .. })).await;

    let player = registry.get(GUILD).await.unwrap();
    assert_eq!(player.state(), PlayerState::Stopped);
    let urls: Vec<_> = session
        .inputs()
        .into_iter()
        .map(|input| match input {
            AudioInput::Stream { url, .. } => url,
            AudioInput::File(path) => path.display().to_string(),
        })
        .collect();
    assert_eq!(
        urls,
        [
            "https://cdn.example.com/one.mp3",
            "https://cdn.example.com/two.mp3",
            "https://cdn.example.com/three.mp3",
        ]
    );
}

#[tokio::test]
async fn broken_stream_moves_on_and_is_reported() {
    let connector = ScriptedConnector::new();
    let (registry, events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");

    registry.request(GUILD, &channel, remote("flaky", 30)).await.unwrap();
    registry.request(GUILD, &channel, remote("solid", 30)).await.unwrap();

    connector
        .latest()
        .end_stream(Some(PlaybackError::Network("connection reset".into())));

    let failed = next_event(&events, |e| matches!(e, Event::TrackFailed { .. })).await;
    assert_eq!(failed.guild(), GUILD);
    next_event(&events, started("solid")).await;
}

#[tokio::test]
async fn commands_after_eviction_report_no_player() {
    let connector = ScriptedConnector::new();
    let (registry, _events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");
    registry.request(GUILD, &channel, remote("one", 30)).await.unwrap();

    assert!(registry.evict(GUILD).await);

    assert!(connector.latest().is_closed());
    assert_eq!(
        registry.dispatch(GUILD, AudioCommand::Pause).await,
        Err(PlayerError::NoActivePlayer)
    );
}

#[tokio::test]
async fn volume_and_queue_commands_round_trip_through_registry() {
    let connector = ScriptedConnector::new();
    let (registry, _events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");
    registry.request(GUILD, &channel, remote("one", 30)).await.unwrap();
    registry.request(GUILD, &channel, remote("two", 95)).await.unwrap();

    assert_eq!(
        registry
            .dispatch(GUILD, AudioCommand::SetVolumePercent(40))
            .await,
        Ok(CommandOutcome::Volume(0.4))
    );
    assert_eq!(
        registry.dispatch(GUILD, AudioCommand::VolumeUp(250)).await,
        Ok(CommandOutcome::Volume(1.0))
    );

    let Ok(CommandOutcome::Queue(queue)) = registry.dispatch(GUILD, AudioCommand::ListQueue).await
    else {
        panic!("queue listing failed");
    };
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].display_duration(), "01:35");

    assert_eq!(
        registry
            .dispatch(GUILD, AudioCommand::RemoveFromQueue(3))
            .await,
        Err(PlayerError::IndexOutOfRange { index: 3, len: 1 })
    );
}

#[tokio::test]
async fn favorites_play_through_local_backend() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("anthem.mp3");
    std::fs::write(&audio, b"not decoded by the scripted session").unwrap();

    let favorites = JsonFavoritesStore::open(dir.path().join("favorites.json")).unwrap();
    favorites
        .insert(Track::local("Anthem", "https://example.com/anthem", &audio, 200).unwrap())
        .unwrap();

    let connector = ScriptedConnector::new();
    let (registry, events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");

    registry.request(GUILD, &channel, remote("warmup", 30)).await.unwrap();
    let outcome = registry
        .request_favorite(GUILD, &channel, &favorites, "Anthem")
        .await
        .unwrap();

    assert_eq!(outcome, RequestOutcome::Started);
    next_event(&events, started("Anthem")).await;
    let player = registry.get(GUILD).await.unwrap();
    assert_eq!(player.kind(), BackendKind::LocalFile);
    assert_eq!(connector.sessions().len(), 2);
    assert!(connector.sessions()[0].1.is_closed());
    assert_eq!(connector.latest().inputs(), [AudioInput::File(audio)]);

    assert_eq!(
        registry
            .request_favorite(GUILD, &channel, &favorites, "Missing")
            .await,
        Err(PlayerError::FavoriteNotFound("Missing".into()))
    );
}

#[tokio::test]
async fn stopped_player_ignores_late_stream_end() {
    let connector = ScriptedConnector::new();
    let (registry, events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");
    registry.request(GUILD, &channel, remote("one", 30)).await.unwrap();
    registry.request(GUILD, &channel, remote("two", 30)).await.unwrap();
    next_event(&events, started("one")).await;

    let session = connector.latest();
    let late = session.take_pending().expect("stream one is playing");
    registry.dispatch(GUILD, AudioCommand::Stop).await.unwrap();
    late.finish(None);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let status = registry.get(GUILD).await.unwrap().status();
    assert_eq!(status.state, PlayerState::Stopped);
    assert!(status.current.is_none());
    assert_eq!(status.queue.len(), 1);
    assert_eq!(session.inputs().len(), 1);
    assert!(!events.drain().any(|e| started("two")(&e)));
}

#[tokio::test]
async fn stream_end_queued_before_stop_is_dropped() {
    let connector = ScriptedConnector::new();
    let (registry, events) = registry(&connector);
    let channel = ChannelHandle::new("lounge");
    registry.request(GUILD, &channel, remote("one", 30)).await.unwrap();
    registry.request(GUILD, &channel, remote("two", 30)).await.unwrap();

    let session = connector.latest();
    assert!(session.end_stream(None));
    registry.dispatch(GUILD, AudioCommand::Stop).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let status = registry.get(GUILD).await.unwrap().status();
    assert_eq!(status.state, PlayerState::Stopped);
    assert_eq!(status.queue.len(), 1);
    assert_eq!(session.inputs().len(), 1);
    assert!(!events.drain().any(|e| started("two")(&e)));
}
