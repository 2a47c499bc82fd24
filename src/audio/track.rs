use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::error::PlayerError;

/// A resolved, playable item. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    title: String,
    source_uri: String,
    local_path: Option<PathBuf>,
    duration_secs: u64,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        source_uri: impl Into<String>,
        local_path: Option<PathBuf>,
        duration_secs: u64,
    ) -> Result<Self, PlayerError> {
        let title = title.into();
        let source_uri = source_uri.into();

        if title.trim().is_empty() {
            return Err(PlayerError::InvalidTrack("title is empty".into()));
        }
        if source_uri.trim().is_empty() {
            return Err(PlayerError::InvalidTrack(format!(
                "source uri of {title:?} is empty"
            )));
        }
        if local_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(PlayerError::InvalidTrack(format!(
                "local path of {title:?} is empty"
            )));
        }

        Ok(Self {
            title,
            source_uri,
            local_path,
            duration_secs,
        })
    }

    pub fn remote(
        title: impl Into<String>,
        url: impl Into<String>,
        duration_secs: u64,
    ) -> Result<Self, PlayerError> {
        Self::new(title, url, None, duration_secs)
    }

    pub fn local(
        title: impl Into<String>,
        source_uri: impl Into<String>,
        path: impl Into<PathBuf>,
        duration_secs: u64,
    ) -> Result<Self, PlayerError> {
        Self::new(title, source_uri, Some(path.into()), duration_secs)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn is_local(&self) -> bool {
        self.local_path.is_some()
    }

    /// `mm:ss`, minutes are not wrapped into hours.
    pub fn display_duration(&self) -> String {
        format!("{:02}:{:02}", self.duration_secs / 60, self.duration_secs % 60)
    }

    pub fn exceeds(&self, max: Duration) -> bool {
        self.duration() > max
    }
}
