//! Selected-track state for the recordings page

use folio_common::db::tracks::{self, Track};
use folio_common::{EventBus, FolioEvent};
use sqlx::SqlitePool;
use tracing::debug;

/// Ordered recordings with an optional selection
///
/// Every selection change is published as [`FolioEvent::TrackChanged`].
pub struct TrackList {
    tracks: Vec<Track>,
    selected: Option<usize>,
    bus: EventBus,
}

impl TrackList {
    pub fn new(tracks: Vec<Track>, bus: EventBus) -> Self {
        Self {
            tracks,
            selected: None,
            bus,
        }
    }

    /// Build from the tracks table in display order
    pub async fn load(db: &SqlitePool, bus: EventBus) -> crate::Result<Self> {
        let tracks = tracks::list_tracks(db).await?;
        debug!(count = tracks.len(), "Loaded track list");
        Ok(Self::new(tracks, bus))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Track> {
        self.selected.and_then(|i| self.tracks.get(i))
    }

    /// Select by index; out of range leaves the selection unchanged
    pub fn select(&mut self, index: usize) -> Option<&Track> {
        let track = self.tracks.get(index)?;
        self.selected = Some(index);
        self.bus.emit_lossy(FolioEvent::TrackChanged {
            index,
            track_id: track.id,
            title: track.title.clone(),
        });
        debug!(index, title = %track.title, "Track selected");
        self.tracks.get(index)
    }

    /// Advance, wrapping to the first track; selects the first when nothing is selected
    pub fn next(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let index = match self.selected {
            Some(i) => (i + 1) % self.tracks.len(),
            None => 0,
        };
        self.select(index)
    }

    /// Step back, wrapping to the last track
    pub fn previous(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let len = self.tracks.len();
        let index = match self.selected {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        };
        self.select(index)
    }

    /// Swap in a refreshed list, keeping the selected track if it survived
    pub fn replace(&mut self, tracks: Vec<Track>) {
        let selected_id = self.selected().map(|t| t.id);
        self.tracks = tracks;
        self.selected = selected_id.and_then(|id| self.tracks.iter().position(|t| t.id == id));
    }
}
