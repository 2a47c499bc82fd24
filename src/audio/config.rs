use std::{path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

use crate::util::log::get_data_dir;

/// Transport-level reconnect limits for remote streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    const BASE_DELAY: Duration = Duration::from_millis(250);

    /// Exponential backoff from 250ms, capped at `max_delay`. `attempt` starts at 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        Self::BASE_DELAY.saturating_mul(factor).min(self.max_delay)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_volume: f32,
    /// Step on the 0-100 scale used by volume up/down.
    pub volume_step: u8,
    pub reconnect: ReconnectPolicy,
    pub completion_poll: Duration,
    pub favorites_path: PathBuf,
    pub max_track_duration: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            volume_step: 5,
            reconnect: ReconnectPolicy::default(),
            completion_poll: Duration::from_millis(100),
            favorites_path: get_data_dir().join("favorites.json"),
            max_track_duration: Duration::from_secs(3600),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `VOXQUEUE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(volume) = parse::<u8>(&lookup, "VOXQUEUE_VOLUME") {
            config.initial_volume = f32::from(volume.min(100)) / 100.0;
        }
        if let Some(attempts) = parse::<u32>(&lookup, "VOXQUEUE_RECONNECT_ATTEMPTS") {
            config.reconnect.max_attempts = attempts;
        }
        if let Some(secs) = parse::<u64>(&lookup, "VOXQUEUE_RECONNECT_DELAY_MAX") {
            config.reconnect.max_delay = Duration::from_secs(secs);
        }
        if let Some(data) = lookup("VOXQUEUE_DATA") {
            config.favorites_path = PathBuf::from(data).join("favorites.json");
        }

        config
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw.as_str(), "config_value_ignored");
            None
        }
    }
}
