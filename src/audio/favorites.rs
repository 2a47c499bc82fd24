use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::{debug, info};

use crate::audio::{error::FavoritesError, track::Track};

pub trait FavoritesStore: Send + Sync {
    fn get_by_title(&self, title: &str) -> Option<Track>;

    /// Fails with [`FavoritesError::Duplicate`] when the title is taken.
    fn insert(&self, track: Track) -> Result<(), FavoritesError>;

    fn titles(&self) -> Vec<String>;
}

/// Favorites kept in memory and mirrored to a JSON file on every insert.
pub struct JsonFavoritesStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Track>>,
}

impl JsonFavoritesStore {
    /// Loads `path` if it exists. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FavoritesError> {
        let path = path.into();
        let tracks: Vec<Track> = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let entries = tracks
            .into_iter()
            .map(|track| (track.title().to_owned(), track))
            .collect::<BTreeMap<_, _>>();
        debug!(path = %path.display(), count = entries.len(), "favorites_loaded");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &BTreeMap<String, Track>) -> Result<(), FavoritesError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tracks: Vec<&Track> = entries.values().collect();
        let content = serde_json::to_string_pretty(&tracks)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl FavoritesStore for JsonFavoritesStore {
    fn get_by_title(&self, title: &str) -> Option<Track> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(title)
            .cloned()
    }

    fn insert(&self, track: Track) -> Result<(), FavoritesError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(track.title()) {
            return Err(FavoritesError::Duplicate(track.title().to_owned()));
        }

        let title = track.title().to_owned();
        entries.insert(title.clone(), track);
        if let Err(err) = self.save(&entries) {
            entries.remove(&title);
            return Err(err);
        }

        info!(title = title.as_str(), "favorite_added");
        Ok(())
    }

    fn titles(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(title: &str) -> Track {
        Track::local(title, format!("https://example.com/{title}"), format!("music/{title}.mp3"), 90)
            .unwrap()
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFavoritesStore::open(dir.path().join("favorites.json")).unwrap();

        assert!(store.titles().is_empty());
        assert_eq!(store.get_by_title("anything"), None);
    }

    #[test]
    fn insert_persists_and_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("favorites.json");
        let store = JsonFavoritesStore::open(&path).unwrap();

        store.insert(local("b")).unwrap();
        store.insert(local("a")).unwrap();
        assert!(matches!(
            store.insert(local("a")),
            Err(FavoritesError::Duplicate(title)) if title == "a"
        ));

        let reopened = JsonFavoritesStore::open(&path).unwrap();
        assert_eq!(reopened.titles(), ["a", "b"]);
        assert_eq!(reopened.get_by_title("b"), Some(local("b")));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFavoritesStore::open(&path),
            Err(FavoritesError::Serde(_))
        ));
    }
}
