#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use flume::Receiver;
use voxqueue::{
    AudioInput, AudioSession, ChannelHandle, CompletionHandle, ConnectError, Event, PlaybackError,
    VoiceConnector,
};

/// Session that never makes a sound. Streams end when the test says so.
#[derive(Default)]
pub struct ScriptedSession {
    inputs: Mutex<Vec<AudioInput>>,
    pending: Mutex<Option<CompletionHandle>>,
    closed: Mutex<bool>,
}

impl ScriptedSession {
    pub fn inputs(&self) -> Vec<AudioInput> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    /// Holds on to the current stream's handle so it can end after a stop.
    pub fn take_pending(&self) -> Option<CompletionHandle> {
        self.pending.lock().unwrap().take()
    }

    pub fn end_stream(&self, error: Option<PlaybackError>) -> bool {
        match self.pending.lock().unwrap().take() {
            Some(handle) => {
                handle.finish(error);
                true
            }
            None => false,
        }
    }
}

struct SessionHandle(Arc<ScriptedSession>);

impl AudioSession for SessionHandle {
    fn play(&self, input: AudioInput, _volume: f32, on_completion: CompletionHandle) {
        self.0.inputs.lock().unwrap().push(input);
        if let Some(previous) = self.0.pending.lock().unwrap().replace(on_completion) {
            previous.finish(None);
        }
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn stop(&self) {
        self.0.end_stream(None);
    }

    fn set_volume(&self, _volume: f32) {}

    fn close(&self) {
        self.stop();
        *self.0.closed.lock().unwrap() = true;
    }
}

#[derive(Default)]
pub struct ScriptedConnector {
    sessions: Mutex<Vec<(ChannelHandle, Arc<ScriptedSession>)>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sessions(&self) -> Vec<(ChannelHandle, Arc<ScriptedSession>)> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Arc<ScriptedSession> {
        self.sessions.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl VoiceConnector for ScriptedConnector {
    async fn connect(
        &self,
        channel: &ChannelHandle,
    ) -> Result<Box<dyn AudioSession>, ConnectError> {
        let session = Arc::new(ScriptedSession::default());
        self.sessions
            .lock()
            .unwrap()
            .push((channel.clone(), session.clone()));
        Ok(Box::new(SessionHandle(session)))
    }
}

pub async fn next_event(events: &Receiver<Event>, matches: impl Fn(&Event) -> bool) -> Event {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv_async())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if matches(&event) {
            return event;
        }
    }
}
