use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct ScrollTiming {
    pub tick: Duration,
    pub pause: Duration,
}

impl Default for ScrollTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            pause: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ScrollAction {
    Advance,
    Reset,
}

/// Advance one character until the tail of the text fits in the window, then reset.
pub fn next_action(text_len: usize, offset: usize, window: usize) -> ScrollAction {
    if text_len.saturating_sub(offset) < window {
        ScrollAction::Reset
    } else {
        ScrollAction::Advance
    }
}

/// The `window` characters starting at `offset`, pulled back if the text has since shrunk.
pub fn visible_slice(text: &str, offset: usize, window: usize) -> String {
    let len = text.chars().count();
    let start = offset.min(len.saturating_sub(window));
    text.chars().skip(start).take(window).collect()
}

/// Background ticker owning the scroll offset of one line of text.
pub struct Scroller {
    offset: Arc<AtomicUsize>,
}

impl Scroller {
    pub fn spawn<F>(
        name: &str,
        text_len: F,
        window: usize,
        timing: ScrollTiming,
        shutdown: Arc<AtomicBool>,
    ) -> std::io::Result<Self>
    where
        F: Fn() -> usize + Send + 'static,
    {
        let offset = Arc::new(AtomicUsize::new(0));
        let shared = offset.clone();
        thread::Builder::new()
            .name(format!("scroll-{name}"))
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    let current = shared.load(Ordering::Relaxed);
                    match next_action(text_len(), current, window) {
                        ScrollAction::Advance => {
                            shared.store(current + 1, Ordering::Relaxed);
                            thread::sleep(timing.tick);
                        }
                        ScrollAction::Reset => {
                            thread::sleep(timing.pause);
                            shared.store(0, Ordering::Relaxed);
                            thread::sleep(timing.pause);
                        }
                    }
                }
            })?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> usize {
        self.offset.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn advances_while_text_overflows() {
        assert_eq!(next_action(40, 0, 30), ScrollAction::Advance);
        assert_eq!(next_action(40, 10, 30), ScrollAction::Advance);
        assert_eq!(next_action(40, 11, 30), ScrollAction::Reset);
    }

    #[test]
    fn short_text_always_resets() {
        assert_eq!(next_action(5, 0, 30), ScrollAction::Reset);
        assert_eq!(next_action(0, 0, 30), ScrollAction::Reset);
        assert_eq!(next_action(5, 9, 30), ScrollAction::Reset);
    }

    #[test]
    fn slices_by_characters() {
        assert_eq!(visible_slice("Björk - Jóga", 0, 5), "Björk");
        assert_eq!(visible_slice("abcdefgh", 2, 3), "cde");
        assert_eq!(visible_slice("short", 0, 30), "short");
    }

    #[test]
    fn stale_offset_is_pulled_back_into_range() {
        assert_eq!(visible_slice("abcdef", 40, 4), "cdef");
        assert_eq!(visible_slice("abc", 2, 30), "abc");
    }

    #[test]
    fn scroller_thread_walks_to_the_end_and_resets() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let timing = ScrollTiming {
            tick: Duration::from_millis(1),
            pause: Duration::from_millis(20),
        };
        let scroller = Scroller::spawn("test", || 8, 5, timing, shutdown.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = scroller.offset();
        while seen < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
            seen = scroller.offset();
        }
        // never runs past the last full window
        assert_eq!(seen, 4);

        while seen != 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
            seen = scroller.offset();
        }
        assert_eq!(seen, 0);
        shutdown.store(true, Ordering::Relaxed);
    }
}
