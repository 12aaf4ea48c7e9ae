use std::sync::{Arc, Mutex, PoisonError};

/// The one process-wide belief about what is playing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackState {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_art_url: Option<String>,
    pub play_count: u64,
    /// Bumped each time a new cover image has been written to disk.
    pub art_revision: u64,
}

impl TrackState {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.artist.is_empty()
    }
}

/// Mutex-guarded `TrackState` shared by the session thread and the render loop.
///
/// Writers go through [`SharedTrack::update`], readers take a full clone with
/// [`SharedTrack::snapshot`], so a frame never sees half of an update.
#[derive(Clone, Default)]
pub struct SharedTrack {
    inner: Arc<Mutex<TrackState>>,
}

impl SharedTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TrackState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut TrackState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}
