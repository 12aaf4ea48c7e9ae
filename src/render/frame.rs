use std::path::PathBuf;

use super::cover::Sprite;
use super::scroll::visible_slice;
use super::text::TextOverlay;
use crate::audio::features::FrequencyBands;
use crate::config::GuiConfig;
use crate::session::state::TrackState;

pub const COVER_SIZE: u32 = 400;
const COVER_POS: (i32, i32) = (0, 100);
const LOGO_SIZE: u32 = 50;
const LOGO_POS: (i32, i32) = (10, 10);
const USERNAME_POS: (i32, i32) = (65, 20);
/// Horizontal centre of the text column under the cover.
const TEXT_CENTER_X: i32 = 200;
const PLAYS_Y: i32 = 70;
const TITLE_Y: i32 = 510;
const ARTIST_Y: i32 = 540;
/// Bars start right of the cover and stop short of the right edge.
const BARS_LEFT: u32 = 400;
const BARS_RIGHT_MARGIN: u32 = 20;
const BARS_TOP_MARGIN: u32 = 100;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// Character offsets of the two scrolling text lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScrollOffsets {
    pub artist: usize,
    pub title: usize,
}

/// Bar height in pixels per band: `magnitude / scale` clamped to `[0, 1]`, times `max_height`.
pub fn bar_heights(bands: &FrequencyBands, scale: f32, max_height: u32) -> Vec<u32> {
    bands
        .magnitudes
        .iter()
        .map(|&m| {
            let norm = if scale > 0.0 { (m / scale).clamp(0.0, 1.0) } else { 0.0 };
            (norm * max_height as f32) as u32
        })
        .collect()
}

/// Red fading to green as the bar grows, constant blue.
pub fn bar_color(height: u32, max_height: u32) -> [u8; 4] {
    let level = if max_height == 0 {
        0
    } else {
        (height.min(max_height) * 100 / max_height) as u8
    };
    [200 - level, level, 100, 255]
}

/// Software renderer for one display frame: cover art, Last.fm logo and username, play count,
/// scrolling title and artist, and the mirrored equalizer.
pub struct FrameCompositor {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    text: Option<TextOverlay>,
    username: String,
    magnitude_scale: f32,
    scroll_window: usize,
    cover_path: PathBuf,
    cover: Option<Sprite>,
    cover_revision: Option<u64>,
    logo: Option<Sprite>,
}

impl FrameCompositor {
    pub fn new(gui: &GuiConfig, username: &str, text: Option<TextOverlay>) -> Self {
        let logo = gui.logo_path.as_deref().and_then(|path| {
            Sprite::load(path, LOGO_SIZE, LOGO_SIZE)
                .map_err(|e| log::warn!("No logo from {}: {}", path.display(), e))
                .ok()
        });
        Self {
            width: gui.screen_width,
            height: gui.screen_height,
            pixels: vec![0; (gui.screen_width * gui.screen_height * 4) as usize],
            text,
            username: username.to_string(),
            magnitude_scale: gui.magnitude_scale,
            scroll_window: gui.scroll_window,
            cover_path: gui.cover_art_path.clone(),
            cover: None,
            cover_revision: None,
            logo,
        }
    }

    pub fn max_bar_height(&self) -> u32 {
        (self.height / 2).saturating_sub(BARS_TOP_MARGIN)
    }

    /// Re-read the cover image whenever a new one has been written. A failed read keeps
    /// whatever was shown before.
    fn refresh_cover(&mut self, revision: u64) {
        if self.cover_revision == Some(revision) {
            return;
        }
        self.cover_revision = Some(revision);
        match Sprite::load(&self.cover_path, COVER_SIZE, COVER_SIZE) {
            Ok(sprite) => self.cover = Some(sprite),
            Err(e) => log::debug!("Cover art {} not loaded: {}", self.cover_path.display(), e),
        }
    }

    pub fn compose(&mut self, bands: &FrequencyBands, track: &TrackState, scroll: ScrollOffsets) -> &[u8] {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&BACKGROUND);
        }

        self.refresh_cover(track.art_revision);
        if let Some(cover) = &self.cover {
            cover.blit(&mut self.pixels, self.width, self.height, COVER_POS.0, COVER_POS.1);
        }
        if let Some(logo) = &self.logo {
            logo.blit(&mut self.pixels, self.width, self.height, LOGO_POS.0, LOGO_POS.1);
        }

        self.draw_bars(bands);

        if let Some(text) = &self.text {
            let (w, h) = (self.width, self.height);
            text.composite(&mut self.pixels, w, h, &self.username, USERNAME_POS.0, USERNAME_POS.1, WHITE);

            let plays = format!("{} Plays", track.play_count);
            text.composite_centered(&mut self.pixels, w, h, &plays, TEXT_CENTER_X, PLAYS_Y, WHITE);

            let title = visible_slice(&track.title, scroll.title, self.scroll_window);
            text.composite_centered(&mut self.pixels, w, h, &title, TEXT_CENTER_X, TITLE_Y, WHITE);

            let artist = visible_slice(&track.artist, scroll.artist, self.scroll_window);
            text.composite_centered(&mut self.pixels, w, h, &artist, TEXT_CENTER_X, ARTIST_Y, WHITE);
        }

        &self.pixels
    }

    /// Bars grow up from the horizontal midline; the lower half mirrors them.
    fn draw_bars(&mut self, bands: &FrequencyBands) {
        if bands.magnitudes.is_empty() {
            return;
        }
        let max_height = self.max_bar_height();
        let span = self.width.saturating_sub(BARS_LEFT + BARS_RIGHT_MARGIN) as f32;
        let bar_width = span / bands.len() as f32;
        let mid = self.height / 2;

        for (i, h) in bar_heights(bands, self.magnitude_scale, max_height).into_iter().enumerate() {
            if h == 0 {
                continue;
            }
            let x0 = BARS_LEFT + (i as f32 * bar_width) as u32;
            let x1 = BARS_LEFT + ((i + 1) as f32 * bar_width) as u32;
            let color = bar_color(h, max_height);
            self.fill_rect(x0, mid - h, x1, mid + h, color);
        }
    }

    fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 4]) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        if x0 >= x1 {
            return;
        }
        for y in y0..y1 {
            let start = ((y * self.width + x0) * 4) as usize;
            let end = ((y * self.width + x1) * 4) as usize;
            for px in self.pixels[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
        }
    }
}
