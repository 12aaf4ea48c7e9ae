use std::path::PathBuf;

use super::art::{persist_art, ArtFetcher};
use super::{ScrobbleEvent, ScrobbleService};
use crate::session::state::SharedTrack;
use crate::session::tracker::ChangeEvent;

/// What `handle_change` managed to do; every step is attempted regardless of the others.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub scrobbled: bool,
    pub play_count: Option<u64>,
    pub art_saved: bool,
}

pub struct ScrobbleCoordinator {
    scrobbler: Box<dyn ScrobbleService>,
    art_fetcher: Box<dyn ArtFetcher>,
    cover_art_path: PathBuf,
    state: SharedTrack,
}

impl ScrobbleCoordinator {
    pub fn new(
        scrobbler: Box<dyn ScrobbleService>,
        art_fetcher: Box<dyn ArtFetcher>,
        cover_art_path: PathBuf,
        state: SharedTrack,
    ) -> Self {
        Self {
            scrobbler,
            art_fetcher,
            cover_art_path,
            state,
        }
    }

    /// Scrobble, refresh the play count and fetch cover art for a new track. Failures are
    /// logged and never returned.
    pub fn handle_change(&self, change: &ChangeEvent) -> ChangeReport {
        let event = ScrobbleEvent {
            artist: change.artist.clone(),
            title: change.title.clone(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        log::info!(
            "Now playing '{}' by '{}' (timestamp {})",
            event.title,
            event.artist,
            event.timestamp
        );

        let mut report = ChangeReport::default();

        match self.scrobbler.scrobble(&event) {
            Ok(()) => report.scrobbled = true,
            Err(e) => log::warn!("Scrobble of '{}' failed: {}", event.title, e),
        }

        match self.scrobbler.play_count(&event.artist, &event.title) {
            Ok(Some(count)) => {
                self.state.update(|s| s.play_count = count);
                log::info!("{} plays of '{}'", count, event.title);
                report.play_count = Some(count);
            }
            Ok(None) => log::debug!("No play count for '{}'", event.title),
            Err(e) => log::warn!("Play count lookup for '{}' failed: {}", event.title, e),
        }

        if let Some(url) = change.cover_art_url.as_deref() {
            let saved = self
                .art_fetcher
                .fetch(url)
                .and_then(|bytes| persist_art(&self.cover_art_path, &bytes));
            match saved {
                Ok(()) => {
                    self.state.update(|s| s.art_revision += 1);
                    report.art_saved = true;
                }
                Err(e) => log::warn!("Keeping previous cover art: {}", e),
            }
        }

        report
    }
}
