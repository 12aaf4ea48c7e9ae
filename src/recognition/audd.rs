use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use std::time::Duration;

use super::{RecognitionError, RecognitionResult, Recognizer};
use crate::audio::features::AudioBuffer;
use crate::audio::wav::encode_wav;
use crate::config::RecognitionConfig;

const USER_AGENT: &str = concat!("earmark/", env!("CARGO_PKG_VERSION"));
const APPLE_ARTWORK_SIZE: &str = "600";

/// AudD fingerprint lookup: one multipart WAV upload per call.
pub struct AuddClient {
    http: Client,
    endpoint: String,
    api_token: String,
}

impl AuddClient {
    pub fn new(config: &RecognitionConfig, timeout: Duration) -> Result<Self, RecognitionError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        if config.api_token.is_empty() {
            log::warn!("recognition.apiToken is empty; AudD will reject most requests");
        }
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
        })
    }
}

impl Recognizer for AuddClient {
    fn recognize(&self, recording: &AudioBuffer) -> Result<Option<RecognitionResult>, RecognitionError> {
        let wav = encode_wav(recording)?;
        let file = multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("api_token", self.api_token.clone())
            .text("return", "spotify,apple_music")
            .part("file", file);

        log::debug!(
            "Uploading {:.1}s recording to {}",
            recording.duration_secs(),
            self.endpoint
        );
        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()?
            .error_for_status()?;
        let body: AuddResponse = response
            .json()
            .map_err(|e| RecognitionError::Parse(e.to_string()))?;
        body.into_result()
    }
}

#[derive(Debug, Deserialize)]
struct AuddResponse {
    status: String,
    #[serde(default)]
    result: Option<AuddTrack>,
    #[serde(default)]
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddError {
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct AuddTrack {
    #[serde(default)]
    artist: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    spotify: Option<SpotifyInfo>,
    #[serde(default)]
    apple_music: Option<AppleMusicInfo>,
}

#[derive(Debug, Deserialize)]
struct SpotifyInfo {
    #[serde(default)]
    album: Option<SpotifyAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
    #[serde(default)]
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AppleMusicInfo {
    #[serde(default)]
    artwork: Option<AppleArtwork>,
}

#[derive(Debug, Deserialize)]
struct AppleArtwork {
    url: String,
}

impl AuddResponse {
    fn into_result(self) -> Result<Option<RecognitionResult>, RecognitionError> {
        match self.status.as_str() {
            "success" => {}
            "error" => {
                let (code, message) = self
                    .error
                    .map(|e| (e.error_code, e.error_message))
                    .unwrap_or((-1, "unknown error".into()));
                return Err(RecognitionError::Service { code, message });
            }
            other => return Err(RecognitionError::Parse(format!("status '{}'", other))),
        }

        let Some(track) = self.result else {
            return Ok(None);
        };
        if track.title.is_empty() && track.artist.is_empty() {
            return Ok(None);
        }
        let cover_art_url = track.cover_art_url();
        Ok(Some(RecognitionResult {
            title: track.title,
            artist: track.artist,
            album: track.album,
            cover_art_url,
        }))
    }
}

impl AuddTrack {
    /// Largest Spotify album image, else the Apple Music artwork template filled in.
    fn cover_art_url(&self) -> Option<String> {
        let spotify = self
            .spotify
            .as_ref()
            .and_then(|s| s.album.as_ref())
            .and_then(|a| a.images.iter().max_by_key(|img| img.width.unwrap_or(0)))
            .map(|img| img.url.clone());
        spotify.or_else(|| {
            self.apple_music
                .as_ref()
                .and_then(|a| a.artwork.as_ref())
                .map(|art| {
                    art.url
                        .replace("{w}", APPLE_ARTWORK_SIZE)
                        .replace("{h}", APPLE_ARTWORK_SIZE)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Option<RecognitionResult>, RecognitionError> {
        serde_json::from_str::<AuddResponse>(json).unwrap().into_result()
    }

    #[test]
    fn match_with_spotify_artwork() {
        let result = parse(
            r#"{"status":"success","result":{
                "artist":"Imagine Dragons","title":"Warriors","album":"Smoke + Mirrors",
                "release_date":"2014-09-18","timecode":"00:40",
                "spotify":{"album":{"images":[
                    {"height":300,"url":"https://i.scdn.co/300.jpg","width":300},
                    {"height":640,"url":"https://i.scdn.co/640.jpg","width":640}
                ]}},
                "apple_music":{"artwork":{"url":"https://is1.mzstatic.com/{w}x{h}bb.jpg"}}
            }}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(result.title, "Warriors");
        assert_eq!(result.artist, "Imagine Dragons");
        assert_eq!(result.album, "Smoke + Mirrors");
        assert_eq!(result.cover_art_url.as_deref(), Some("https://i.scdn.co/640.jpg"));
    }

    #[test]
    fn falls_back_to_apple_artwork() {
        let result = parse(
            r#"{"status":"success","result":{"artist":"A","title":"T",
                "apple_music":{"artwork":{"url":"https://is1.mzstatic.com/{w}x{h}bb.jpg"}}}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            result.cover_art_url.as_deref(),
            Some("https://is1.mzstatic.com/600x600bb.jpg")
        );
    }

    #[test]
    fn match_without_artwork() {
        let result = parse(r#"{"status":"success","result":{"artist":"A","title":"T"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(result.cover_art_url, None);
        assert_eq!(result.album, "");
    }

    #[test]
    fn null_result_is_no_match() {
        assert!(parse(r#"{"status":"success","result":null}"#).unwrap().is_none());
        assert!(parse(r#"{"status":"success"}"#).unwrap().is_none());
    }

    #[test]
    fn service_error_is_distinct_from_no_match() {
        let err = parse(
            r#"{"status":"error","error":{"error_code":901,"error_message":"Recognition failed: limit reached"}}"#,
        )
        .unwrap_err();
        match err {
            RecognitionError::Service { code, message } => {
                assert_eq!(code, 901);
                assert!(message.contains("limit"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_parse_error() {
        assert!(matches!(
            parse(r#"{"status":"maintenance"}"#),
            Err(RecognitionError::Parse(_))
        ));
    }
}
