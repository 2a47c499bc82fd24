use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use flume::Sender;
use tracing::debug;

use crate::audio::error::PlaybackError;

/// Identifies one started stream. Allocated by the player, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub stream: StreamId,
    pub error: Option<PlaybackError>,
}

/// Single-shot completion signal handed to whoever plays a stream.
///
/// Consumed by [`CompletionHandle::finish`]. Dropping it unfinished reports
/// [`PlaybackError::StreamAbandoned`], so every started stream ends exactly once.
/// Once [`Suppressor::suppress`] has been called nothing is delivered.
#[derive(Debug)]
pub struct CompletionHandle {
    stream: StreamId,
    suppressed: Arc<AtomicBool>,
    tx: Option<Sender<Completion>>,
}

#[derive(Debug, Clone)]
pub struct Suppressor {
    stream: StreamId,
    suppressed: Arc<AtomicBool>,
}

impl CompletionHandle {
    pub fn new(stream: StreamId, tx: Sender<Completion>) -> Self {
        Self {
            stream,
            suppressed: Arc::new(AtomicBool::new(false)),
            tx: Some(tx),
        }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn suppressor(&self) -> Suppressor {
        Suppressor {
            stream: self.stream,
            suppressed: self.suppressed.clone(),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }

    pub fn finish(mut self, error: Option<PlaybackError>) {
        self.deliver(error);
    }

    fn deliver(&mut self, error: Option<PlaybackError>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if self.is_suppressed() {
            debug!(stream = %self.stream, "completion_suppressed");
            return;
        }
        let _ = tx.send(Completion {
            stream: self.stream,
            error,
        });
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.deliver(Some(PlaybackError::StreamAbandoned));
        }
    }
}

impl Suppressor {
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn suppress(&self) {
        self.suppressed.store(true, Ordering::SeqCst);
    }
}
