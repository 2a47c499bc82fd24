use std::sync::Arc;

use crate::audio::{
    backend::{BackendKind, InputResolver, SessionBackend},
    config::ReconnectPolicy,
    error::PlaybackError,
    track::Track,
    traits::{AudioInput, VoiceConnector},
};

/// Streams tracks from their source URI. Reconnects are left to the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteStream {
    reconnect: ReconnectPolicy,
}

impl InputResolver for RemoteStream {
    const KIND: BackendKind = BackendKind::RemoteStream;

    fn resolve(&self, track: &Track) -> Result<AudioInput, PlaybackError> {
        let url = track.source_uri();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PlaybackError::Network(format!("unsupported stream url {url:?}")));
        }

        Ok(AudioInput::Stream {
            url: url.to_owned(),
            reconnect: self.reconnect,
        })
    }
}

pub type RemoteStreamBackend = SessionBackend<RemoteStream>;

impl RemoteStreamBackend {
    pub fn new(connector: Arc<dyn VoiceConnector>, reconnect: ReconnectPolicy) -> Self {
        Self::with_resolver(RemoteStream { reconnect }, connector)
    }
}
