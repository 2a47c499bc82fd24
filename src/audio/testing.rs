//! In-memory voice transport used by unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::audio::{
    completion::CompletionHandle,
    error::{ConnectError, PlaybackError},
    traits::{AudioInput, AudioSession, ChannelHandle, VoiceConnector},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Play(AudioInput),
    Pause,
    Resume,
    Stop,
    Volume(f32),
    Close,
}

#[derive(Debug, Default)]
pub struct SessionLog {
    calls: Mutex<Vec<SessionCall>>,
    pending: Mutex<Vec<CompletionHandle>>,
}

impl SessionLog {
    fn record(&self, call: SessionCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn plays(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SessionCall::Play(_)))
            .count()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Ends the current stream as if the audio ran out (or broke).
    pub fn finish_current(&self, error: Option<PlaybackError>) -> bool {
        let handle = self.pending.lock().unwrap().pop();
        match handle {
            Some(handle) => {
                handle.finish(error);
                true
            }
            None => false,
        }
    }

    /// Takes the current stream's handle so a test can fire it later.
    pub fn take_current(&self) -> Option<CompletionHandle> {
        self.pending.lock().unwrap().pop()
    }
}

pub struct FakeSession {
    log: Arc<SessionLog>,
}

impl AudioSession for FakeSession {
    fn play(&self, input: AudioInput, _volume: f32, on_completion: CompletionHandle) {
        self.log.record(SessionCall::Play(input));
        self.log.pending.lock().unwrap().push(on_completion);
    }

    fn pause(&self) {
        self.log.record(SessionCall::Pause);
    }

    fn resume(&self) {
        self.log.record(SessionCall::Resume);
    }

    /// Like a real transport, stopping fires the stream's end callback.
    fn stop(&self) {
        self.log.record(SessionCall::Stop);
        self.finish_stopped();
    }

    fn set_volume(&self, volume: f32) {
        self.log.record(SessionCall::Volume(volume));
    }

    fn close(&self) {
        self.log.record(SessionCall::Close);
        self.finish_stopped();
    }
}

impl FakeSession {
    fn finish_stopped(&self) {
        let stopped: Vec<_> = self.log.pending.lock().unwrap().drain(..).collect();
        for handle in stopped {
            handle.finish(None);
        }
    }
}

#[derive(Default)]
pub struct FakeConnector {
    sessions: Mutex<Vec<Arc<SessionLog>>>,
    fail: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn session(&self, index: usize) -> Arc<SessionLog> {
        self.sessions.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        channel: &ChannelHandle,
    ) -> Result<Box<dyn AudioSession>, ConnectError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ConnectError::ChannelUnavailable(channel.to_string()));
        }
        let log = Arc::new(SessionLog::default());
        self.sessions.lock().unwrap().push(log.clone());
        Ok(Box::new(FakeSession { log }))
    }
}
