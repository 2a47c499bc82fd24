use std::fmt;

use im::Vector;

use crate::audio::{backend::BackendKind, track::Track, traits::ChannelHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Stopped => "stopped",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Published after every transition; readable without taking the player lock.
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub current: Option<Track>,
    pub volume: f32,
    pub queue: Vector<Track>,
    pub backend: BackendKind,
    pub channel: Option<ChannelHandle>,
}

impl PlayerStatus {
    pub fn idle(backend: BackendKind, volume: f32) -> Self {
        Self {
            state: PlayerState::Stopped,
            current: None,
            volume,
            queue: Vector::new(),
            backend,
            channel: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn is_connected_to(&self, channel: &ChannelHandle) -> bool {
        self.channel.as_ref() == Some(channel)
    }
}
