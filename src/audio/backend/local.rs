use std::sync::Arc;

use crate::audio::{
    backend::{BackendKind, InputResolver, SessionBackend},
    error::PlaybackError,
    track::Track,
    traits::{AudioInput, VoiceConnector},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFile;

impl InputResolver for LocalFile {
    const KIND: BackendKind = BackendKind::LocalFile;

    fn resolve(&self, track: &Track) -> Result<AudioInput, PlaybackError> {
        let path = track
            .local_path()
            .ok_or_else(|| PlaybackError::MissingLocalPath(track.title().to_owned()))?;

        if !path.is_file() {
            return Err(PlaybackError::FileNotFound(path.to_path_buf()));
        }

        Ok(AudioInput::File(path.to_path_buf()))
    }
}

pub type LocalFileBackend = SessionBackend<LocalFile>;

impl LocalFileBackend {
    pub fn new(connector: Arc<dyn VoiceConnector>) -> Self {
        Self::with_resolver(LocalFile, connector)
    }
}
