pub mod cover;
pub mod frame;
pub mod scroll;
pub mod text;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::spectrum::SpectrumAnalyzer;
use crate::audio::AudioSource;
use crate::display::{DisplayError, FrameSink};
use crate::session::state::SharedTrack;
use frame::{FrameCompositor, ScrollOffsets};
use scroll::Scroller;

/// Live visualization: one chunk, one spectrum, one snapshot, one frame, at a fixed cadence.
pub struct RenderLoop {
    analyzer: SpectrumAnalyzer,
    compositor: FrameCompositor,
    state: SharedTrack,
    scrollers: Option<(Scroller, Scroller)>,
    frame_interval: Duration,
}

impl RenderLoop {
    pub fn new(analyzer: SpectrumAnalyzer, compositor: FrameCompositor, state: SharedTrack, fps: u32) -> Self {
        Self {
            analyzer,
            compositor,
            state,
            scrollers: None,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
        }
    }

    pub fn with_scrollers(mut self, artist: Scroller, title: Scroller) -> Self {
        self.scrollers = Some((artist, title));
        self
    }

    fn scroll_offsets(&self) -> ScrollOffsets {
        match &self.scrollers {
            Some((artist, title)) => ScrollOffsets {
                artist: artist.offset(),
                title: title.offset(),
            },
            None => ScrollOffsets::default(),
        }
    }

    pub fn render_frame(&mut self, source: &dyn AudioSource) -> &[u8] {
        let chunk = source.read_chunk();
        let bands = self.analyzer.analyze(&chunk.samples);
        let track = self.state.snapshot();
        let offsets = self.scroll_offsets();
        self.compositor.compose(&bands, &track, offsets)
    }

    /// Runs until `shutdown` is raised or the display goes away; returns the frames shown.
    pub fn run(
        &mut self,
        source: &dyn AudioSource,
        sink: &mut dyn FrameSink,
        shutdown: &AtomicBool,
    ) -> Result<u64, DisplayError> {
        let mut presented = 0u64;
        let mut next_frame = Instant::now();
        while !shutdown.load(Ordering::Relaxed) {
            let frame = self.render_frame(source);
            match sink.present(frame) {
                Ok(()) => presented += 1,
                Err(DisplayError::Closed) => {
                    log::info!("Display closed after {} frames", presented);
                    break;
                }
                Err(e) => return Err(e),
            }

            next_frame += self.frame_interval;
            let now = Instant::now();
            if next_frame > now {
                thread::sleep(next_frame - now);
            } else {
                // fell behind; don't try to catch up
                next_frame = now;
            }
        }
        Ok(presented)
    }
}
