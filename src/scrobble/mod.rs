pub mod art;
pub mod coordinator;
pub mod lastfm;

use thiserror::Error;

/// One play, stamped when the change was handled rather than when the track began.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrobbleEvent {
    pub artist: String,
    pub title: String,
    pub timestamp: i64,
}

#[derive(Debug, Error)]
pub enum ScrobbleError {
    #[error("scrobble request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Last.fm error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("scrobble was ignored: {0}")]
    Ignored(String),
    #[error("unexpected Last.fm response: {0}")]
    Parse(String),
}

/// Listening-history backend.
pub trait ScrobbleService: Send {
    fn scrobble(&self, event: &ScrobbleEvent) -> Result<(), ScrobbleError>;

    /// The user's play count for a track; `Ok(None)` when the service has no figure.
    fn play_count(&self, artist: &str, title: &str) -> Result<Option<u64>, ScrobbleError>;
}

/// Stand-in used when no Last.fm credentials are configured.
pub struct DisabledScrobbler;

impl ScrobbleService for DisabledScrobbler {
    fn scrobble(&self, event: &ScrobbleEvent) -> Result<(), ScrobbleError> {
        log::debug!(
            "Scrobbling disabled, not submitting '{}' by '{}'",
            event.title,
            event.artist
        );
        Ok(())
    }

    fn play_count(&self, _artist: &str, _title: &str) -> Result<Option<u64>, ScrobbleError> {
        Ok(None)
    }
}
