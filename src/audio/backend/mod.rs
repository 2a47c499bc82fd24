//! Playback strategies. Both variants share [`SessionBackend`]; they only differ
//! in how a [`Track`] becomes an [`AudioInput`].

mod local;
mod remote;

pub use local::{LocalFile, LocalFileBackend};
pub use remote::{RemoteStream, RemoteStreamBackend};

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::audio::{
    completion::{CompletionHandle, Suppressor},
    config::EngineConfig,
    error::{ConnectError, PlaybackError},
    track::Track,
    traits::{AudioInput, AudioSession, ChannelHandle, VoiceConnector},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    LocalFile,
    RemoteStream,
}

impl BackendKind {
    pub fn for_track(track: &Track) -> Self {
        if track.is_local() {
            BackendKind::LocalFile
        } else {
            BackendKind::RemoteStream
        }
    }

    pub fn build(
        self,
        connector: Arc<dyn VoiceConnector>,
        config: &EngineConfig,
    ) -> Box<dyn PlaybackBackend> {
        match self {
            BackendKind::LocalFile => Box::new(
                LocalFileBackend::new(connector).with_volume(config.initial_volume),
            ),
            BackendKind::RemoteStream => Box::new(
                RemoteStreamBackend::new(connector, config.reconnect)
                    .with_volume(config.initial_volume),
            ),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::LocalFile => f.write_str("local-file"),
            BackendKind::RemoteStream => f.write_str("remote-stream"),
        }
    }
}

/// Clamps to `0.0..=1.0`; NaN becomes silence.
pub fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Turns tracks into audio on one session.
///
/// `start_playback` never fails synchronously: any problem starting the stream
/// is reported through `on_completion` with an error attached.
#[async_trait]
pub trait PlaybackBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Tears down an existing session first, then opens a new one.
    async fn connect(&mut self, channel: &ChannelHandle) -> Result<(), ConnectError>;

    fn is_connected(&self) -> bool;

    fn channel(&self) -> Option<&ChannelHandle>;

    /// Stops any current stream (suppressed) before starting `track`.
    fn start_playback(&mut self, track: &Track, on_completion: CompletionHandle);

    fn pause_output(&mut self);

    fn resume_output(&mut self);

    /// Halts the current stream; its completion is never delivered.
    fn stop_output(&mut self);

    fn set_volume(&mut self, level: f32) -> f32;

    fn volume(&self) -> f32;

    /// Safe to call repeatedly.
    fn destroy(&mut self);
}

pub trait InputResolver: Send + Sync + 'static {
    const KIND: BackendKind;

    fn resolve(&self, track: &Track) -> Result<AudioInput, PlaybackError>;
}

pub struct SessionBackend<R> {
    resolver: R,
    connector: Arc<dyn VoiceConnector>,
    session: Option<Box<dyn AudioSession>>,
    channel: Option<ChannelHandle>,
    active: Option<Suppressor>,
    volume: f32,
}

impl<R> SessionBackend<R> {
    pub fn with_resolver(resolver: R, connector: Arc<dyn VoiceConnector>) -> Self {
        Self {
            resolver,
            connector,
            session: None,
            channel: None,
            active: None,
            volume: 1.0,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = clamp_volume(volume);
        self
    }

    fn halt(&mut self) {
        if let Some(active) = self.active.take() {
            active.suppress();
            debug!(stream = %active.stream(), "stream_stopped");
            if let Some(session) = &self.session {
                session.stop();
            }
        }
    }

    fn teardown(&mut self) {
        self.halt();
        if let Some(session) = self.session.take() {
            session.close();
            info!(
                channel = self.channel.as_ref().map(ChannelHandle::as_str),
                "session_closed"
            );
        }
        self.channel = None;
    }
}

#[async_trait]
impl<R: InputResolver> PlaybackBackend for SessionBackend<R> {
    fn kind(&self) -> BackendKind {
        R::KIND
    }

    async fn connect(&mut self, channel: &ChannelHandle) -> Result<(), ConnectError> {
        if self.session.is_some() {
            debug!(channel = channel.as_str(), "session_replaced");
            self.teardown();
        }

        let session = self.connector.connect(channel).await?;
        session.set_volume(self.volume);
        self.session = Some(session);
        self.channel = Some(channel.clone());

        info!(channel = channel.as_str(), backend = %R::KIND, "session_opened");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn channel(&self) -> Option<&ChannelHandle> {
        self.channel.as_ref()
    }

    fn start_playback(&mut self, track: &Track, on_completion: CompletionHandle) {
        self.halt();

        let Some(session) = &self.session else {
            on_completion.finish(Some(PlaybackError::NoSession));
            return;
        };

        match self.resolver.resolve(track) {
            Ok(input) => {
                debug!(stream = %on_completion.stream(), title = track.title(), "stream_requested");
                self.active = Some(on_completion.suppressor());
                session.play(input, self.volume, on_completion);
            }
            Err(err) => {
                warn!(title = track.title(), error = %err, "stream_rejected");
                on_completion.finish(Some(err));
            }
        }
    }

    fn pause_output(&mut self) {
        if let (Some(_), Some(session)) = (&self.active, &self.session) {
            session.pause();
        }
    }

    fn resume_output(&mut self) {
        if let (Some(_), Some(session)) = (&self.active, &self.session) {
            session.resume();
        }
    }

    fn stop_output(&mut self) {
        self.halt();
    }

    fn set_volume(&mut self, level: f32) -> f32 {
        self.volume = clamp_volume(level);
        if let Some(session) = &self.session {
            session.set_volume(self.volume);
        }
        self.volume
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn destroy(&mut self) {
        self.teardown();
    }
}

impl<R> Drop for SessionBackend<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}
