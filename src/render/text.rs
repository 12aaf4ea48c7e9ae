use anyhow::{bail, Context, Result};
use fontdue::{Font, FontSettings};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Download a TTF/OTF font. Used when `gui.fontUrl` is set.
pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let bytes = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to download font from {}", url))?
        .bytes()?;
    log::info!("Downloaded font from {} ({} bytes)", url, bytes.len());
    Ok(bytes.to_vec())
}

/// Candidate font files in the order they are tried.
fn font_candidates(font_path: Option<&Path>) -> Vec<PathBuf> {
    font_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect()
}

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    /// Downloaded bytes win over a configured path, which wins over the system fonts.
    pub fn new(font_size: f32, font_path: Option<&Path>, font_bytes: Option<&[u8]>) -> Result<Self> {
        if let Some(bytes) = font_bytes {
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => return Ok(Self { font, font_size }),
                Err(e) => log::warn!("Downloaded font is unusable: {}", e),
            }
        }

        for candidate in font_candidates(font_path) {
            let Ok(bytes) = std::fs::read(&candidate) else {
                continue;
            };
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    log::debug!("Using font {}", candidate.display());
                    return Ok(Self { font, font_size });
                }
                Err(e) => log::warn!("Skipping font {}: {}", candidate.display(), e),
            }
        }
        bail!("No usable font found; set gui.fontPath or gui.fontUrl")
    }

    /// Composite text onto an RGBA pixel buffer with its top-left corner at (x, y).
    pub fn composite(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        x: i32,
        y: i32,
        color: [u8; 4],
    ) {
        let mut cursor_x = x as f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_x = cursor_x.round() as i32 + metrics.xmin;
            let glyph_y = y + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }
                    let px = glyph_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }
                    let idx = ((py as u32 * width + px as u32) * 4) as usize;
                    if let Some(dst) = pixels.get_mut(idx..idx + 4) {
                        blend(dst, color, alpha);
                    }
                }
            }

            cursor_x += metrics.advance_width;
        }
    }

    /// Composite text horizontally centred on `center_x`.
    pub fn composite_centered(
        &self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        text: &str,
        center_x: i32,
        y: i32,
        color: [u8; 4],
    ) {
        let x = center_x - self.measure_width(text) as i32 / 2;
        self.composite(pixels, width, height, text, x, y, color);
    }

    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

/// Source-over blend of `color` scaled by glyph coverage into one RGBA pixel.
fn blend(dst: &mut [u8], color: [u8; 4], coverage: u8) {
    let a = coverage as f32 / 255.0 * (color[3] as f32 / 255.0);
    let inv_a = 1.0 - a;
    for c in 0..3 {
        dst[c] = (color[c] as f32 * a + dst[c] as f32 * inv_a).round() as u8;
    }
    dst[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_font_is_tried_first() {
        let candidates = font_candidates(Some(Path::new("/opt/fonts/custom.ttf")));
        assert_eq!(candidates[0], PathBuf::from("/opt/fonts/custom.ttf"));
        assert_eq!(candidates.len(), SYSTEM_FONTS.len() + 1);
        assert_eq!(font_candidates(None).len(), SYSTEM_FONTS.len());
    }

    #[test]
    fn full_coverage_replaces_pixel() {
        let mut px = [10, 20, 30, 0];
        blend(&mut px, [255, 255, 255, 255], 255);
        assert_eq!(px, [255, 255, 255, 255]);
    }

    #[test]
    fn partial_coverage_mixes() {
        let mut px = [0, 0, 0, 255];
        blend(&mut px, [200, 100, 0, 255], 128);
        assert_eq!(px, [100, 50, 0, 255]);
    }

    #[test]
    fn garbage_bytes_fall_through_to_error_or_system_font() {
        // Succeeds only if a system font is installed; either way it must not panic.
        let missing = Path::new("/nonexistent/font.ttf");
        if let Ok(overlay) = TextOverlay::new(20.0, Some(missing), Some(&b"not a font"[..])) {
            assert_eq!(overlay.font_size, 20.0);
            assert!(overlay.measure_width("abc") > 0);
        }
    }
}
