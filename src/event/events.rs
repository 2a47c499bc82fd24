use crate::audio::{
    error::PlaybackError,
    state::PlayerState,
    track::Track,
    traits::{ChannelHandle, GuildId},
};

/// Observer notifications emitted by players. Delivery is best-effort.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected {
        guild: GuildId,
        channel: ChannelHandle,
    },
    TrackStarted {
        guild: GuildId,
        track: Track,
    },
    TrackEnded {
        guild: GuildId,
        track: Track,
    },
    TrackSkipped {
        guild: GuildId,
        track: Track,
    },
    /// The stream failed to start or broke mid-way; the queue has already moved on.
    TrackFailed {
        guild: GuildId,
        track: Option<Track>,
        error: PlaybackError,
    },
    QueueEnded {
        guild: GuildId,
    },
    StateChanged {
        guild: GuildId,
        state: PlayerState,
    },
    VolumeChanged {
        guild: GuildId,
        volume: f32,
    },
    PlayerDestroyed {
        guild: GuildId,
    },
}

impl Event {
    pub fn guild(&self) -> GuildId {
        match self {
            Event::Connected { guild, .. }
            | Event::TrackStarted { guild, .. }
            | Event::TrackEnded { guild, .. }
            | Event::TrackSkipped { guild, .. }
            | Event::TrackFailed { guild, .. }
            | Event::QueueEnded { guild }
            | Event::StateChanged { guild, .. }
            | Event::VolumeChanged { guild, .. }
            | Event::PlayerDestroyed { guild } => *guild,
        }
    }
}
