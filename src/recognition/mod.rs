pub mod audd;

use thiserror::Error;

use crate::audio::features::AudioBuffer;

/// What the fingerprint service says is playing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecognitionResult {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_art_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("recognition service error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("unexpected recognition response: {0}")]
    Parse(String),
    #[error("failed to encode recording: {0}")]
    Encode(#[from] hound::Error),
}

/// A fingerprint lookup. `Ok(None)` is a genuine no-match; every failure is an `Err`.
/// Implementations make exactly one attempt per call.
pub trait Recognizer: Send {
    fn recognize(&self, recording: &AudioBuffer) -> Result<Option<RecognitionResult>, RecognitionError>;
}
