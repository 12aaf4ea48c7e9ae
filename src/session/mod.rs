pub mod state;
pub mod tracker;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::audio::sampler::DeviceError;
use crate::audio::wav;
use crate::audio::AudioSource;
use crate::recognition::{RecognitionError, Recognizer};
use crate::scrobble::coordinator::{ChangeReport, ScrobbleCoordinator};
use tracker::TrackTracker;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("recording failed: {0}")]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    NoMatch,
    Unchanged,
    Changed(ChangeReport),
}

/// Retry pacing after failed cycles: `base`, doubling per consecutive failure, capped at `max`.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: None,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.base,
            Some(prev) => prev.saturating_mul(2),
        }
        .min(self.max);
        self.current = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

pub struct SessionSettings {
    pub record_seconds: f32,
    pub recording_path: Option<PathBuf>,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

/// record → recognize → evaluate → scrobble, forever, on its own thread.
pub struct SessionLoop {
    source: Box<dyn AudioSource>,
    recognizer: Box<dyn Recognizer>,
    tracker: TrackTracker,
    coordinator: ScrobbleCoordinator,
    record_seconds: f32,
    recording_path: Option<PathBuf>,
    backoff: Backoff,
}

impl SessionLoop {
    pub fn new(
        source: Box<dyn AudioSource>,
        recognizer: Box<dyn Recognizer>,
        tracker: TrackTracker,
        coordinator: ScrobbleCoordinator,
        settings: SessionSettings,
    ) -> Self {
        Self {
            source,
            recognizer,
            tracker,
            coordinator,
            record_seconds: settings.record_seconds,
            recording_path: settings.recording_path,
            backoff: Backoff::new(settings.retry_base, settings.retry_max),
        }
    }

    pub fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let recording = self.source.record_fixed_duration(self.record_seconds)?;
        log::debug!(
            "Recorded {:.1}s in {:.1}s",
            recording.duration_secs(),
            started.elapsed().as_secs_f32()
        );

        if let Some(path) = &self.recording_path {
            if let Err(e) = wav::write_wav(path, &recording) {
                log::warn!("Could not write {}: {}", path.display(), e);
            }
        }

        let Some(result) = self.recognizer.recognize(&recording)? else {
            log::info!("Could not recognize the song");
            return Ok(CycleOutcome::NoMatch);
        };
        log::debug!("Recognized '{}' by '{}'", result.title, result.artist);

        match self.tracker.observe(Some(result)) {
            Some(change) => Ok(CycleOutcome::Changed(self.coordinator.handle_change(&change))),
            None => Ok(CycleOutcome::Unchanged),
        }
    }

    /// Runs cycles until `shutdown` is set. Errors and panics from a cycle are logged and the
    /// loop carries on after the backoff delay.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!("Recognition loop started ({:.1}s recordings)", self.record_seconds);
        while !shutdown.load(Ordering::Relaxed) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()));
            let failure = match outcome {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(format!("panic: {}", panic_message(payload.as_ref()))),
            };
            match failure {
                None => self.backoff.reset(),
                Some(reason) => {
                    let delay = self.backoff.next_delay();
                    log::error!("Recognition cycle failed ({}); retrying in {:?}", reason, delay);
                    sleep_unless_shutdown(delay, shutdown);
                }
            }
        }
        log::info!("Recognition loop stopped");
    }

    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("session".into())
            .spawn(move || self.run(&shutdown))
    }
}

fn sleep_unless_shutdown(delay: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + delay;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || shutdown.load(Ordering::Relaxed) {
            return;
        }
        thread::sleep(remaining.min(SHUTDOWN_POLL));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::AudioBuffer;
    use crate::recognition::RecognitionResult;
    use crate::scrobble::coordinator::tests::{FakeArt, FakeScrobbler};
    use state::SharedTrack;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeSource {
        fail: bool,
    }

    impl AudioSource for FakeSource {
        fn sample_rate(&self) -> u32 {
            8000
        }

        fn read_chunk(&self) -> AudioBuffer {
            AudioBuffer::new(vec![0; 16], 8000)
        }

        fn record_fixed_duration(&self, seconds: f32) -> Result<AudioBuffer, DeviceError> {
            if self.fail {
                return Err(DeviceError::Stalled);
            }
            Ok(AudioBuffer::new(vec![0; (seconds * 8000.0) as usize], 8000))
        }
    }

    enum Step {
        Match(&'static str, &'static str),
        NoMatch,
        Timeout,
        Panic,
    }

    /// Plays back a script, then raises the shutdown flag once it runs dry.
    struct ScriptedRecognizer {
        script: Mutex<VecDeque<Step>>,
        shutdown: Arc<AtomicBool>,
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&self, _: &AudioBuffer) -> Result<Option<RecognitionResult>, RecognitionError> {
            let step = self.script.lock().unwrap().pop_front();
            if self.script.lock().unwrap().is_empty() {
                self.shutdown.store(true, Ordering::Relaxed);
            }
            match step {
                Some(Step::Match(title, artist)) => Ok(Some(RecognitionResult {
                    title: title.into(),
                    artist: artist.into(),
                    album: String::new(),
                    cover_art_url: None,
                })),
                Some(Step::NoMatch) | None => Ok(None),
                Some(Step::Timeout) => Err(RecognitionError::Parse("timed out".into())),
                Some(Step::Panic) => panic!("recognizer blew up"),
            }
        }
    }

    struct Harness {
        session: SessionLoop,
        scrobbler: FakeScrobbler,
        state: SharedTrack,
        shutdown: Arc<AtomicBool>,
    }

    fn harness(script: Vec<Step>, source_fails: bool) -> Harness {
        let shutdown = Arc::new(AtomicBool::new(false));
        let state = SharedTrack::new();
        let scrobbler = FakeScrobbler {
            play_count: Some(1),
            ..Default::default()
        };
        let coordinator = ScrobbleCoordinator::new(
            Box::new(scrobbler.clone()),
            Box::new(FakeArt { bytes: None }),
            PathBuf::from("unused.jpg"),
            state.clone(),
        );
        let session = SessionLoop::new(
            Box::new(FakeSource { fail: source_fails }),
            Box::new(ScriptedRecognizer {
                script: Mutex::new(script.into()),
                shutdown: shutdown.clone(),
            }),
            TrackTracker::new(state.clone()),
            coordinator,
            SessionSettings {
                record_seconds: 0.01,
                recording_path: None,
                retry_base: Duration::from_millis(1),
                retry_max: Duration::from_millis(4),
            },
        );
        Harness {
            session,
            scrobbler,
            state,
            shutdown,
        }
    }

    #[test]
    fn backoff_doubles_caps_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn first_match_scrobbles_once() {
        let mut h = harness(vec![Step::Match("A", "X")], false);
        let outcome = h.session.run_cycle().unwrap();
        assert!(matches!(outcome, CycleOutcome::Changed(ref r) if r.scrobbled));

        let scrobbles = h.scrobbler.scrobbles.lock().unwrap();
        assert_eq!(scrobbles.len(), 1);
        assert_eq!((scrobbles[0].artist.as_str(), scrobbles[0].title.as_str()), ("X", "A"));
        assert_eq!(
            *h.scrobbler.lookups.lock().unwrap(),
            vec![("X".to_string(), "A".to_string())]
        );
    }

    #[test]
    fn same_track_twice_does_not_scrobble_again() {
        let mut h = harness(vec![Step::Match("A", "X"), Step::Match("A", "X")], false);
        h.session.run_cycle().unwrap();
        assert_eq!(h.session.run_cycle().unwrap(), CycleOutcome::Unchanged);
        assert_eq!(h.scrobbler.scrobbles.lock().unwrap().len(), 1);
    }

    #[test]
    fn recognition_timeout_leaves_state_untouched() {
        let mut h = harness(vec![Step::Match("A", "X"), Step::Timeout], false);
        h.session.run_cycle().unwrap();
        let before = h.state.snapshot();
        assert!(matches!(h.session.run_cycle(), Err(CycleError::Recognition(_))));
        assert_eq!(h.state.snapshot(), before);
        assert_eq!(h.scrobbler.scrobbles.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let mut h = harness(vec![Step::NoMatch], false);
        assert_eq!(h.session.run_cycle().unwrap(), CycleOutcome::NoMatch);
        assert!(h.state.snapshot().is_empty());
    }

    #[test]
    fn device_failure_surfaces_as_cycle_error() {
        let mut h = harness(vec![Step::Match("A", "X")], true);
        assert!(matches!(h.session.run_cycle(), Err(CycleError::Device(DeviceError::Stalled))));
        assert!(h.scrobbler.scrobbles.lock().unwrap().is_empty());
    }

    #[test]
    fn loop_survives_errors_and_panics() {
        let mut h = harness(
            vec![
                Step::Timeout,
                Step::Match("A", "X"),
                Step::Panic,
                Step::Match("A", "X"),
                Step::NoMatch,
                Step::Match("B", "Y"),
            ],
            false,
        );
        let shutdown = h.shutdown.clone();
        h.session.run(&shutdown);

        let scrobbles = h.scrobbler.scrobbles.lock().unwrap();
        let titles: Vec<&str> = scrobbles.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(h.state.snapshot().title, "B");
    }

    #[test]
    fn spawned_loop_runs_off_the_calling_thread() {
        let h = harness(vec![Step::Match("A", "X")], false);
        let caller = thread::current().id();
        let handle = h.session.spawn(h.shutdown.clone()).unwrap();
        assert_eq!(handle.thread().name(), Some("session"));
        assert_ne!(handle.thread().id(), caller);
        handle.join().unwrap();
        assert_eq!(h.scrobbler.scrobbles.lock().unwrap().len(), 1);
    }
}
