pub mod audio;
pub mod event;
pub mod host;
pub mod stream;
pub mod util;

pub use audio::{
    backend::{BackendKind, LocalFileBackend, PlaybackBackend, RemoteStreamBackend},
    commands::{AudioCommand, CommandOutcome},
    completion::{Completion, CompletionHandle, StreamId},
    config::{EngineConfig, ReconnectPolicy},
    error::{ConnectError, FavoritesError, PlaybackError, PlayerError},
    favorites::{FavoritesStore, JsonFavoritesStore},
    output::RodioConnector,
    player::PlayerStateMachine,
    queue::Queue,
    registry::{PlayerRegistry, RequestOutcome},
    state::{PlayerState, PlayerStatus},
    track::Track,
    traits::{AudioInput, AudioSession, ChannelHandle, GuildId, VoiceConnector},
};
pub use event::events::Event;
