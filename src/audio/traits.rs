use std::{fmt, path::PathBuf};

use async_trait::async_trait;

use crate::audio::{completion::CompletionHandle, config::ReconnectPolicy, error::ConnectError};

/// Opaque destination for audio output. Only the connector interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle(String);

impl ChannelHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioInput {
    File(PathBuf),
    Stream {
        url: String,
        reconnect: ReconnectPolicy,
    },
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        channel: &ChannelHandle,
    ) -> Result<Box<dyn AudioSession>, ConnectError>;
}

/// One live audio-output binding.
///
/// `play` must not block on I/O. Whatever happens to the stream afterwards,
/// the session finishes `on_completion` once (failing to open the input counts).
pub trait AudioSession: Send + Sync {
    fn play(&self, input: AudioInput, volume: f32, on_completion: CompletionHandle);
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    fn set_volume(&self, volume: f32);
    /// Releases the binding. Called at most once per session.
    fn close(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
