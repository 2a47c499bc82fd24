use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use flume::{Receiver, Sender};
use im::Vector;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::{BackendKind, PlaybackBackend},
        commands::{AudioCommand, CommandOutcome},
        completion::{Completion, CompletionHandle, StreamId},
        error::{PlaybackError, PlayerError},
        queue::Queue,
        state::{PlayerState, PlayerStatus},
        track::Track,
        traits::{ChannelHandle, GuildId},
    },
    event::events::Event,
};

/// One voice interaction: a queue, a backend and the authoritative player state.
///
/// Every transition, user-issued or completion-issued, runs under the same lock.
/// Backends report stream ends through a channel that is drained inside that lock,
/// and a completion only advances the queue if it belongs to the stream that is
/// still active. Stopping or skipping clears the active stream, so a late
/// completion for it is dropped instead of popping the queue a second time.
pub struct PlayerStateMachine {
    guild: GuildId,
    kind: BackendKind,
    inner: Arc<Mutex<PlayerInner>>,
    status: Arc<ArcSwap<PlayerStatus>>,
    pump: JoinHandle<()>,
}

struct PlayerInner {
    guild: GuildId,
    queue: Queue,
    backend: Box<dyn PlaybackBackend>,
    current: Option<Track>,
    state: PlayerState,
    active: Option<StreamId>,
    next_stream: u64,
    completion_tx: Sender<Completion>,
    events: Option<Sender<Event>>,
    status: Arc<ArcSwap<PlayerStatus>>,
    destroyed: bool,
}

impl PlayerStateMachine {
    /// Spawns the completion pump, so this needs a Tokio runtime.
    pub fn new(
        guild: GuildId,
        backend: Box<dyn PlaybackBackend>,
        events: Option<Sender<Event>>,
    ) -> Self {
        let (completion_tx, completion_rx) = flume::unbounded();
        let kind = backend.kind();
        let status = Arc::new(ArcSwap::from_pointee(PlayerStatus::idle(
            kind,
            backend.volume(),
        )));

        let inner = Arc::new(Mutex::new(PlayerInner {
            guild,
            queue: Queue::new(),
            backend,
            current: None,
            state: PlayerState::Stopped,
            active: None,
            next_stream: 0,
            completion_tx,
            events,
            status: status.clone(),
            destroyed: false,
        }));

        let pump = tokio::spawn(Self::pump(Arc::downgrade(&inner), completion_rx));
        debug!(guild = %guild, backend = %kind, "player_created");

        Self {
            guild,
            kind,
            inner,
            status,
            pump,
        }
    }

    async fn pump(inner: Weak<Mutex<PlayerInner>>, completions: Receiver<Completion>) {
        while let Ok(completion) = completions.recv_async().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let mut guard = inner.lock().await;
            guard.on_completion(completion);
            guard.publish();
        }
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn status(&self) -> Arc<PlayerStatus> {
        self.status.load_full()
    }

    pub fn state(&self) -> PlayerState {
        self.status.load().state
    }

    pub async fn connect(&self, channel: &ChannelHandle) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_alive()?;
        let result = inner.connect(channel).await;
        inner.publish();
        result
    }

    /// Never starts playback by itself, whatever the current state.
    pub async fn enqueue(&self, track: Track) -> Result<(), PlayerError> {
        self.transition("enqueue", |inner| {
            debug!(guild = %inner.guild, title = track.title(), "track_enqueued");
            inner.queue.enqueue(track);
            Ok(())
        })
        .await
    }

    pub async fn remove_from_queue(&self, index: usize) -> Result<Track, PlayerError> {
        self.transition("remove", |inner| {
            let len = inner.queue.len();
            let track = inner
                .queue
                .remove_at(index)
                .ok_or(PlayerError::IndexOutOfRange { index, len })?;
            debug!(guild = %inner.guild, index, title = track.title(), "track_removed");
            Ok(track)
        })
        .await
    }

    pub async fn list_queue(&self) -> Result<Vector<Track>, PlayerError> {
        self.transition("list", |inner| Ok(inner.queue.snapshot()))
            .await
    }

    pub async fn play(&self) -> Result<(), PlayerError> {
        self.transition("play", PlayerInner::play).await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.transition("pause", PlayerInner::pause).await
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        self.transition("resume", PlayerInner::resume).await
    }

    /// Stopping a stopped player is a no-op, not an error.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.transition("stop", |inner| {
            inner.stop();
            Ok(())
        })
        .await
    }

    pub async fn skip(&self) -> Result<(), PlayerError> {
        self.transition("skip", PlayerInner::skip).await
    }

    pub async fn set_volume(&self, level: f32) -> Result<f32, PlayerError> {
        self.transition("volume", |inner| Ok(inner.set_volume(level)))
            .await
    }

    pub async fn set_volume_percent(&self, percent: i64) -> Result<f32, PlayerError> {
        let level = percent.clamp(0, 100) as f32 / 100.0;
        self.set_volume(level).await
    }

    pub async fn volume_up(&self, step: u8) -> Result<f32, PlayerError> {
        self.transition("volume", |inner| {
            let percent = volume_percent(inner.backend.volume()).saturating_add(step);
            Ok(inner.set_volume(f32::from(percent) / 100.0))
        })
        .await
    }

    pub async fn volume_down(&self, step: u8) -> Result<f32, PlayerError> {
        self.transition("volume", |inner| {
            let percent = volume_percent(inner.backend.volume()).saturating_sub(step);
            Ok(inner.set_volume(f32::from(percent) / 100.0))
        })
        .await
    }

    pub async fn handle_command(&self, cmd: AudioCommand) -> Result<CommandOutcome, PlayerError> {
        match cmd {
            AudioCommand::Enqueue(track) => self.enqueue(track).await.map(|()| CommandOutcome::Done),
            AudioCommand::RemoveFromQueue(index) => {
                self.remove_from_queue(index).await.map(CommandOutcome::Removed)
            }
            AudioCommand::Play => self.play().await.map(|()| CommandOutcome::Done),
            AudioCommand::Pause => self.pause().await.map(|()| CommandOutcome::Done),
            AudioCommand::Resume => self.resume().await.map(|()| CommandOutcome::Done),
            AudioCommand::Stop => self.stop().await.map(|()| CommandOutcome::Done),
            AudioCommand::Skip => self.skip().await.map(|()| CommandOutcome::Done),
            AudioCommand::SetVolume(level) => {
                self.set_volume(level).await.map(CommandOutcome::Volume)
            }
            AudioCommand::SetVolumePercent(percent) => self
                .set_volume_percent(percent)
                .await
                .map(CommandOutcome::Volume),
            AudioCommand::VolumeUp(step) => self.volume_up(step).await.map(CommandOutcome::Volume),
            AudioCommand::VolumeDown(step) => {
                self.volume_down(step).await.map(CommandOutcome::Volume)
            }
            AudioCommand::ListQueue => self.list_queue().await.map(CommandOutcome::Queue),
        }
    }

    /// Releases the backend session. Later calls report [`PlayerError::NoActivePlayer`].
    pub async fn destroy(&self) {
        let mut inner = self.inner.lock().await;
        if inner.destroy() {
            inner.publish();
            info!(guild = %self.guild, "player_destroyed");
        }
        self.pump.abort();
    }

    async fn transition<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut PlayerInner) -> Result<T, PlayerError>,
    ) -> Result<T, PlayerError> {
        let mut inner = self.inner.lock().await;
        let result = inner.ensure_alive().and_then(|()| f(&mut inner));
        inner.publish();

        if let Err(err) = &result {
            debug!(guild = %self.guild, op, error = %err, "precondition_failed");
        }
        result
    }
}

impl Drop for PlayerStateMachine {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

fn volume_percent(level: f32) -> u8 {
    (level * 100.0).round().clamp(0.0, 100.0) as u8
}

impl PlayerInner {
    fn ensure_alive(&self) -> Result<(), PlayerError> {
        if self.destroyed {
            Err(PlayerError::NoActivePlayer)
        } else {
            Ok(())
        }
    }

    async fn connect(&mut self, channel: &ChannelHandle) -> Result<(), PlayerError> {
        let interrupted = self.current.clone().map(|track| (track, self.state));
        // The backend tears down the old session and silences its stream.
        self.active = None;

        match self.backend.connect(channel).await {
            Ok(()) => {
                info!(guild = %self.guild, channel = channel.as_str(), "player_connected");
                self.emit(Event::Connected {
                    guild: self.guild,
                    channel: channel.clone(),
                });

                if let Some((track, state)) = interrupted {
                    debug!(guild = %self.guild, title = track.title(), "track_restarted");
                    self.start(track, state);
                }
                Ok(())
            }
            Err(err) => {
                warn!(guild = %self.guild, channel = channel.as_str(), error = %err, "connect_failed");
                if let Some((track, _)) = interrupted {
                    self.current = None;
                    self.set_state(PlayerState::Stopped);
                    self.emit(Event::TrackFailed {
                        guild: self.guild,
                        track: Some(track),
                        error: PlaybackError::NoSession,
                    });
                }
                Err(err.into())
            }
        }
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Stopped {
            return Err(PlayerError::InvalidState {
                op: "play",
                state: self.state,
            });
        }
        if !self.backend.is_connected() {
            return Err(PlayerError::NotConnected);
        }
        let track = self.queue.dequeue_front().ok_or(PlayerError::QueueEmpty)?;
        self.start(track, PlayerState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Playing {
            return Err(PlayerError::InvalidState {
                op: "pause",
                state: self.state,
            });
        }
        self.backend.pause_output();
        self.set_state(PlayerState::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Paused {
            return Err(PlayerError::InvalidState {
                op: "resume",
                state: self.state,
            });
        }
        self.backend.resume_output();
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == PlayerState::Stopped {
            return;
        }
        if let Some(track) = self.halt() {
            info!(guild = %self.guild, title = track.title(), "playback_stopped");
        }
        self.set_state(PlayerState::Stopped);
    }

    fn skip(&mut self) -> Result<(), PlayerError> {
        if self.state == PlayerState::Stopped {
            return Err(PlayerError::InvalidState {
                op: "skip",
                state: self.state,
            });
        }
        if let Some(track) = self.halt() {
            info!(guild = %self.guild, title = track.title(), "track_skipped");
            self.emit(Event::TrackSkipped {
                guild: self.guild,
                track,
            });
        }
        self.advance();
        Ok(())
    }

    fn set_volume(&mut self, level: f32) -> f32 {
        let applied = self.backend.set_volume(level);
        debug!(guild = %self.guild, requested = level, applied, "volume_set");
        self.emit(Event::VolumeChanged {
            guild: self.guild,
            volume: applied,
        });
        applied
    }

    fn on_completion(&mut self, completion: Completion) {
        if self.destroyed || self.active != Some(completion.stream) {
            debug!(guild = %self.guild, stream = %completion.stream, "stale_completion_dropped");
            return;
        }

        self.active = None;
        let finished = self.current.take();

        match completion.error {
            Some(error) => {
                error!(
                    guild = %self.guild,
                    stream = %completion.stream,
                    title = finished.as_ref().map(Track::title),
                    error = %error,
                    "track_failed"
                );
                self.emit(Event::TrackFailed {
                    guild: self.guild,
                    track: finished,
                    error,
                });
            }
            None => {
                if let Some(track) = finished {
                    info!(guild = %self.guild, title = track.title(), "track_ended");
                    self.emit(Event::TrackEnded {
                        guild: self.guild,
                        track,
                    });
                }
            }
        }

        self.advance();
    }

    fn advance(&mut self) {
        match self.queue.dequeue_front() {
            Some(track) => self.start(track, PlayerState::Playing),
            None => {
                self.active = None;
                self.current = None;
                self.set_state(PlayerState::Stopped);
                info!(guild = %self.guild, "queue_ended");
                self.emit(Event::QueueEnded { guild: self.guild });
            }
        }
    }

    /// `state` is `Paused` only when a paused track is restarted on a new session.
    fn start(&mut self, track: Track, state: PlayerState) {
        self.next_stream += 1;
        let stream = StreamId::new(self.next_stream);
        let handle = CompletionHandle::new(stream, self.completion_tx.clone());

        self.active = Some(stream);
        self.current = Some(track.clone());
        self.backend.start_playback(&track, handle);
        if state == PlayerState::Paused {
            self.backend.pause_output();
        }
        self.set_state(state);

        info!(guild = %self.guild, stream = %stream, title = track.title(), "track_started");
        self.emit(Event::TrackStarted {
            guild: self.guild,
            track,
        });
    }

    /// Stops the backend stream without letting its completion through.
    fn halt(&mut self) -> Option<Track> {
        self.backend.stop_output();
        self.active = None;
        self.current.take()
    }

    fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.backend.destroy();
        self.active = None;
        self.current = None;
        self.queue.clear();
        self.set_state(PlayerState::Stopped);
        self.destroyed = true;
        self.emit(Event::PlayerDestroyed { guild: self.guild });
        true
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state != state {
            self.state = state;
            self.emit(Event::StateChanged {
                guild: self.guild,
                state,
            });
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn publish(&self) {
        self.status.store(Arc::new(PlayerStatus {
            state: self.state,
            current: self.current.clone(),
            volume: self.backend.volume(),
            queue: self.queue.snapshot(),
            backend: self.backend.kind(),
            channel: self.backend.channel().cloned(),
        }));
    }
}
