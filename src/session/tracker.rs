use super::state::{SharedTrack, TrackState};
use crate::recognition::RecognitionResult;

/// A confirmed switch to a different track identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_art_url: Option<String>,
}

/// Decides whether a recognition result is a new track, and records it if so.
pub struct TrackTracker {
    state: SharedTrack,
}

impl TrackTracker {
    pub fn new(state: SharedTrack) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SharedTrack {
        &self.state
    }

    /// Identity is `(title, artist, cover_art_url)`; album changes alone are ignored.
    /// Compare and overwrite happen under one lock.
    pub fn observe(&self, result: Option<RecognitionResult>) -> Option<ChangeEvent> {
        let result = result?;
        self.state.update(|current| {
            if same_identity(current, &result) {
                log::debug!(
                    "Still playing '{}' by '{}', skipping update",
                    result.title,
                    result.artist
                );
                return None;
            }
            current.title = result.title.clone();
            current.artist = result.artist.clone();
            current.album = result.album.clone();
            current.cover_art_url = result.cover_art_url.clone();
            Some(ChangeEvent {
                title: result.title,
                artist: result.artist,
                album: result.album,
                cover_art_url: result.cover_art_url,
            })
        })
    }
}

fn same_identity(state: &TrackState, result: &RecognitionResult) -> bool {
    state.title == result.title
        && state.artist == result.artist
        && state.cover_art_url == result.cover_art_url
}
