//! # Playlist Store
//!
//! In-memory playlists and their tracks. Every track belongs to exactly one
//! playlist; [`PlaylistStore::move_track`] transfers it. The store always holds
//! at least one playlist, so deleting the last one is rejected.
//!
//! ## Import/Export Format
//!
//! ```json
//! { "name": "Evening", "tracks": [{ "name": "calm", "url": "recording:3" }] }
//! ```
//!
//! Bulk export writes an array of these documents. Import accepts either form
//! and refuses documents whose `tracks` field is missing or not an array.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AffirmError, Result};

/// Name given to the playlist a fresh store starts with.
pub const DEFAULT_PLAYLIST_NAME: &str = "My Affirmations";

const IMPORTED_PLAYLIST_NAME: &str = "Imported Playlist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub u64);

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    /// Opaque reference to playable audio: a file path or `recording:<id>`.
    pub url: String,
}

impl Track {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub tracks: Vec<Track>,
}

impl Playlist {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Serialized form of one playlist, without its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDocument {
    pub name: String,
    pub tracks: Vec<Track>,
}

impl From<&Playlist> for PlaylistDocument {
    fn from(playlist: &Playlist) -> Self {
        Self {
            name: playlist.name.clone(),
            tracks: playlist.tracks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistStore {
    playlists: Vec<Playlist>,
    next_id: u64,
}

impl Default for PlaylistStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaylistStore {
    /// Store holding a single empty default playlist.
    #[must_use]
    pub fn new() -> Self {
        let mut store = Self {
            playlists: Vec::new(),
            next_id: 1,
        };
        store.create(DEFAULT_PLAYLIST_NAME);
        store
    }

    /// Load a library file written by [`PlaylistStore::to_json`].
    ///
    /// An empty library gets the default playlist back so the store invariant
    /// holds after loading.
    ///
    /// # Errors
    ///
    /// [`AffirmError::Storage`] when two playlists share an id, or the ids
    /// leave no room to allocate another one.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut store: Self = serde_json::from_str(json)?;

        let mut seen = HashSet::with_capacity(store.playlists.len());
        if let Some(dup) = store.playlists.iter().find(|p| !seen.insert(p.id)) {
            return Err(AffirmError::storage(format!("duplicate playlist id {}", dup.id)));
        }

        let max_id = store.playlists.iter().map(|p| p.id.0).max().unwrap_or(0);
        let next_id = max_id
            .checked_add(1)
            .map(|after_max| store.next_id.max(after_max))
            .filter(|next| next.checked_add(1).is_some())
            .ok_or_else(|| AffirmError::storage(format!("playlist id {max_id} is out of range")))?;
        store.next_id = next_id;

        if store.playlists.is_empty() {
            warn!("Loaded playlist library was empty, recreating default playlist");
            store.create(DEFAULT_PLAYLIST_NAME);
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    pub fn get(&self, id: PlaylistId) -> Result<&Playlist> {
        self.playlists
            .iter()
            .find(|p| p.id == id)
            .ok_or(AffirmError::PlaylistNotFound(id))
    }

    fn get_mut(&mut self, id: PlaylistId) -> Result<&mut Playlist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AffirmError::PlaylistNotFound(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    /// Create an empty playlist and return its id.
    pub fn create(&mut self, name: &str) -> PlaylistId {
        let id = PlaylistId(self.next_id);
        self.next_id += 1;
        self.playlists.push(Playlist {
            id,
            name: name.to_string(),
            tracks: Vec::new(),
        });
        debug!("Created playlist {id} `{name}'");
        id
    }

    /// Delete a playlist together with its tracks.
    ///
    /// # Errors
    ///
    /// [`AffirmError::LastPlaylist`] if it is the only playlist left.
    pub fn delete(&mut self, id: PlaylistId) -> Result<Playlist> {
        let index = self
            .playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or(AffirmError::PlaylistNotFound(id))?;
        if self.playlists.len() == 1 {
            return Err(AffirmError::LastPlaylist);
        }
        let removed = self.playlists.remove(index);
        info!("Deleted playlist {id} `{}' with {} tracks", removed.name, removed.len());
        Ok(removed)
    }

    pub fn rename(&mut self, id: PlaylistId, name: &str) -> Result<()> {
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Append a track; returns its index.
    pub fn add_track(&mut self, id: PlaylistId, track: Track) -> Result<usize> {
        let playlist = self.get_mut(id)?;
        playlist.tracks.push(track);
        Ok(playlist.tracks.len() - 1)
    }

    pub fn remove_track(&mut self, id: PlaylistId, index: usize) -> Result<Track> {
        let playlist = self.get_mut(id)?;
        if index >= playlist.tracks.len() {
            return Err(AffirmError::TrackNotFound { playlist: id, index });
        }
        Ok(playlist.tracks.remove(index))
    }

    pub fn rename_track(&mut self, id: PlaylistId, index: usize, name: &str) -> Result<()> {
        let track = self
            .get_mut(id)?
            .tracks
            .get_mut(index)
            .ok_or(AffirmError::TrackNotFound { playlist: id, index })?;
        track.name = name.to_string();
        Ok(())
    }

    /// Move a track to the end of another playlist.
    ///
    /// Both playlists are checked before anything is removed, so a failed move
    /// leaves the store as it was. Returns the track's index in `to`.
    pub fn move_track(&mut self, from: PlaylistId, index: usize, to: PlaylistId) -> Result<usize> {
        self.get(to)?;
        if from == to {
            let last = self.get(from)?.len().saturating_sub(1);
            self.reorder_track(from, index, last)?;
            return Ok(last);
        }
        let track = self.remove_track(from, index)?;
        debug!("Moving track `{}' from playlist {from} to {to}", track.name);
        self.add_track(to, track)
    }

    /// Move a track to a new position inside the same playlist.
    pub fn reorder_track(&mut self, id: PlaylistId, from: usize, to: usize) -> Result<()> {
        let playlist = self.get_mut(id)?;
        let len = playlist.tracks.len();
        if from >= len {
            return Err(AffirmError::TrackNotFound { playlist: id, index: from });
        }
        if to >= len {
            return Err(AffirmError::TrackNotFound { playlist: id, index: to });
        }
        let track = playlist.tracks.remove(from);
        playlist.tracks.insert(to, track);
        Ok(())
    }

    /// Playlist named after `category`, created if missing.
    pub fn playlist_for_category(&mut self, category: &str) -> PlaylistId {
        match self.find_by_name(category) {
            Some(playlist) => playlist.id,
            None => {
                info!("No playlist for category `{category}', creating one");
                self.create(category)
            }
        }
    }

    /// File a fresh recording under its category's playlist.
    pub fn ingest_recording(&mut self, category: &str, track: Track) -> Result<(PlaylistId, usize)> {
        let id = self.playlist_for_category(category);
        let index = self.add_track(id, track)?;
        Ok((id, index))
    }

    pub fn export(&self, id: PlaylistId) -> Result<String> {
        let document = PlaylistDocument::from(self.get(id)?);
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub fn export_all(&self) -> Result<String> {
        let documents: Vec<PlaylistDocument> = self.playlists.iter().map(PlaylistDocument::from).collect();
        Ok(serde_json::to_string_pretty(&documents)?)
    }

    /// Import one document or an array of documents as new playlists.
    ///
    /// Every document is validated before the store is touched.
    ///
    /// # Errors
    ///
    /// [`AffirmError::MalformedImport`] if the JSON is invalid or any document
    /// lacks an array-typed `tracks` field.
    pub fn import(&mut self, json: &str) -> Result<Vec<PlaylistId>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AffirmError::malformed(format!("invalid JSON: {e}")))?;

        let documents = match value {
            Value::Array(items) => items
                .into_iter()
                .map(parse_document)
                .collect::<Result<Vec<_>>>()?,
            other => vec![parse_document(other)?],
        };

        let ids = documents
            .into_iter()
            .map(|document| {
                let id = self.create(&document.name);
                if let Ok(playlist) = self.get_mut(id) {
                    playlist.tracks = document.tracks;
                }
                id
            })
            .collect::<Vec<_>>();
        info!("Imported {} playlist(s)", ids.len());
        Ok(ids)
    }
}

fn parse_document(value: Value) -> Result<PlaylistDocument> {
    let Value::Object(mut object) = value else {
        return Err(AffirmError::malformed("playlist document must be an object"));
    };

    let tracks = match object.remove("tracks") {
        Some(tracks @ Value::Array(_)) => serde_json::from_value::<Vec<Track>>(tracks)
            .map_err(|e| AffirmError::malformed(format!("invalid track entry: {e}")))?,
        Some(_) => return Err(AffirmError::malformed("`tracks` must be an array")),
        None => return Err(AffirmError::malformed("missing `tracks` field")),
    };

    let name = match object.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => IMPORTED_PLAYLIST_NAME.to_string(),
    };

    Ok(PlaylistDocument { name, tracks })
}
