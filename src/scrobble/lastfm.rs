use md5::{Digest, Md5};
use reqwest::blocking::Client;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{ScrobbleError, ScrobbleEvent, ScrobbleService};
use crate::config::LastFmConfig;

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const USER_AGENT: &str = concat!("earmark/", env!("CARGO_PKG_VERSION"));

// Last.fm error codes
const INVALID_SESSION_KEY: i64 = 9;
const TRACK_NOT_FOUND: i64 = 6;

/// Last.fm 2.0 web API client. Authenticates lazily with a mobile session and keeps the
/// session key until Last.fm reports it invalid.
pub struct LastFmClient {
    http: Client,
    api_root: String,
    api_key: String,
    api_secret: String,
    username: String,
    password: String,
    session_key: Mutex<Option<String>>,
}

impl LastFmClient {
    pub fn new(config: &LastFmConfig, timeout: Duration) -> Result<Self, ScrobbleError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_root: API_ROOT.to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            session_key: Mutex::new(None),
        })
    }

    fn session_key(&self) -> Result<String, ScrobbleError> {
        let mut cached = self.session_key.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let body = self.post_signed(vec![
            ("method", "auth.getMobileSession".into()),
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ])?;
        let key = body["session"]["key"]
            .as_str()
            .ok_or_else(|| ScrobbleError::Parse("auth.getMobileSession returned no key".into()))?
            .to_string();
        log::info!("Authenticated with Last.fm as {}", self.username);
        *cached = Some(key.clone());
        Ok(key)
    }

    fn forget_session(&self) {
        *self.session_key.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn post_signed(&self, mut params: Vec<(&'static str, String)>) -> Result<Value, ScrobbleError> {
        params.push(("api_key", self.api_key.clone()));
        let signature = sign(&params, &self.api_secret);
        params.push(("api_sig", signature));
        params.push(("format", "json".into()));
        let response = self.http.post(&self.api_root).form(&params).send()?;
        read_body(response)
    }

    fn get(&self, mut params: Vec<(&'static str, String)>) -> Result<Value, ScrobbleError> {
        params.push(("api_key", self.api_key.clone()));
        params.push(("format", "json".into()));
        let response = self.http.get(&self.api_root).query(&params).send()?;
        read_body(response)
    }
}

impl ScrobbleService for LastFmClient {
    fn scrobble(&self, event: &ScrobbleEvent) -> Result<(), ScrobbleError> {
        let sk = self.session_key()?;
        let result = self.post_signed(vec![
            ("method", "track.scrobble".into()),
            ("artist", event.artist.clone()),
            ("track", event.title.clone()),
            ("timestamp", event.timestamp.to_string()),
            ("sk", sk),
        ]);
        match result {
            Ok(body) => scrobble_outcome(&body),
            Err(ScrobbleError::Api { code, message }) if code == INVALID_SESSION_KEY => {
                self.forget_session();
                Err(ScrobbleError::Api { code, message })
            }
            Err(e) => Err(e),
        }
    }

    fn play_count(&self, artist: &str, title: &str) -> Result<Option<u64>, ScrobbleError> {
        let result = self.get(vec![
            ("method", "track.getInfo".into()),
            ("artist", artist.to_string()),
            ("track", title.to_string()),
            ("username", self.username.clone()),
            ("autocorrect", "1".into()),
        ]);
        match result {
            Ok(body) => Ok(play_count_from(&body)),
            Err(ScrobbleError::Api { code, .. }) if code == TRACK_NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// `api_sig`: md5 of every `key value` pair sorted by key, then the shared secret.
/// `format` and `callback` are excluded.
pub fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params
        .iter()
        .filter(|(k, _)| *k != "format" && *k != "callback")
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Md5::new();
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn read_body(response: reqwest::blocking::Response) -> Result<Value, ScrobbleError> {
    let status = response.status();
    let text = response.text()?;
    let body: Value = serde_json::from_str(&text)
        .map_err(|_| ScrobbleError::Parse(format!("HTTP {}: {}", status.as_u16(), text)))?;
    if let Some(err) = api_error(&body) {
        return Err(err);
    }
    if !status.is_success() {
        return Err(ScrobbleError::Parse(format!("HTTP {}", status.as_u16())));
    }
    Ok(body)
}

fn api_error(body: &Value) -> Option<ScrobbleError> {
    let code = body.get("error")?.as_i64()?;
    let message = body["message"].as_str().unwrap_or_default().to_string();
    Some(ScrobbleError::Api { code, message })
}

fn scrobble_outcome(body: &Value) -> Result<(), ScrobbleError> {
    let attr = &body["scrobbles"]["@attr"];
    let accepted = json_u64(&attr["accepted"])
        .ok_or_else(|| ScrobbleError::Parse("track.scrobble returned no summary".into()))?;
    if accepted > 0 {
        return Ok(());
    }
    let ignored = &body["scrobbles"]["scrobble"]["ignoredMessage"];
    let reason = ignored["#text"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("code {}", json_u64(&ignored["code"]).unwrap_or(0)));
    Err(ScrobbleError::Ignored(reason))
}

fn play_count_from(body: &Value) -> Option<u64> {
    json_u64(&body["track"]["userplaycount"])
}

/// Last.fm sends most numbers as strings.
fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
