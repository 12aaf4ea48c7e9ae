mod audio;
mod cli;
mod config;
mod display;
mod recognition;
mod render;
mod scrobble;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use audio::sampler::{list_input_devices, AudioSampler};
use audio::spectrum::SpectrumAnalyzer;
use cli::Cli;
use config::Config;
use display::ffplay::FfplayDisplay;
use recognition::audd::AuddClient;
use render::frame::FrameCompositor;
use render::scroll::{ScrollTiming, Scroller};
use render::text::{load_font_from_url, TextOverlay};
use render::RenderLoop;
use scrobble::art::HttpArtFetcher;
use scrobble::coordinator::ScrobbleCoordinator;
use scrobble::lastfm::LastFmClient;
use scrobble::{DisabledScrobbler, ScrobbleService};
use session::state::SharedTrack;
use session::tracker::TrackTracker;
use session::{SessionLoop, SessionSettings};

const FONT_SIZE: f32 = 24.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        let devices = list_input_devices().context("Failed to enumerate audio input devices")?;
        if devices.is_empty() {
            println!("No audio input devices found.");
        }
        for name in devices {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = match config::find_config_path(cli.config.clone()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => {
            log::info!("No config file found, using defaults");
            Config::default()
        }
    };
    cli.apply(&mut config);
    log::debug!("{:?}", config);

    // The stream lives as long as `sampler`; everything else gets a handle.
    let sampler = AudioSampler::open(&config.audio).context("Failed to open audio input")?;

    let state = SharedTrack::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    let session = build_session(&config, &sampler, state.clone())?;
    let session_thread = session
        .spawn(shutdown.clone())
        .context("Failed to start recognition thread")?;

    if cli.headless {
        log::info!("Running headless; press Ctrl-C to stop");
        session_thread
            .join()
            .map_err(|_| anyhow::anyhow!("Recognition thread panicked"))?;
        return Ok(());
    }

    let result = run_display(&config, &sampler, state, shutdown.clone());

    shutdown.store(true, Ordering::Relaxed);
    log::info!("Waiting for the current recognition cycle to finish...");
    if session_thread.join().is_err() {
        log::error!("Recognition thread panicked");
    }
    drop(sampler);
    result
}

fn build_session(config: &Config, sampler: &AudioSampler, state: SharedTrack) -> Result<SessionLoop> {
    let timeout = config.network.timeout();

    let recognizer = AuddClient::new(&config.recognition, timeout)
        .context("Failed to build recognition client")?;

    let scrobbler: Box<dyn ScrobbleService> = if config.lastfm.is_complete() {
        Box::new(LastFmClient::new(&config.lastfm, timeout).context("Failed to build Last.fm client")?)
    } else {
        log::warn!("Last.fm credentials incomplete; scrobbling disabled");
        Box::new(DisabledScrobbler)
    };
    let art = HttpArtFetcher::new(timeout).context("Failed to build cover art client")?;
    let coordinator = ScrobbleCoordinator::new(
        scrobbler,
        Box::new(art),
        config.gui.cover_art_path.clone(),
        state.clone(),
    );

    let settings = SessionSettings {
        record_seconds: config.audio.record_seconds,
        recording_path: config.audio.recording_path.clone(),
        retry_base: std::time::Duration::from_millis(config.gui.update_interval),
        retry_max: config.network.max_backoff(),
    };
    Ok(SessionLoop::new(
        Box::new(sampler.handle()),
        Box::new(recognizer),
        TrackTracker::new(state),
        coordinator,
        settings,
    ))
}

fn run_display(
    config: &Config,
    sampler: &AudioSampler,
    state: SharedTrack,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let gui = &config.gui;

    let font_bytes = gui.font_url.as_deref().and_then(|url| match load_font_from_url(url) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log::warn!("Failed to load font from URL: {}", err);
            None
        }
    });
    let text = match TextOverlay::new(FONT_SIZE, gui.font_path.as_deref(), font_bytes.as_deref()) {
        Ok(text) => Some(text),
        Err(err) => {
            log::warn!("{}; text will not be drawn", err);
            None
        }
    };

    let artist_state = state.clone();
    let artist = Scroller::spawn(
        "artist",
        move || artist_state.snapshot().artist.chars().count(),
        gui.scroll_window,
        ScrollTiming::default(),
        shutdown.clone(),
    )?;
    let title_state = state.clone();
    let title = Scroller::spawn(
        "title",
        move || title_state.snapshot().title.chars().count(),
        gui.scroll_window,
        ScrollTiming::default(),
        shutdown.clone(),
    )?;

    let analyzer = SpectrumAnalyzer::new(
        config.audio.sample_rate,
        config.audio.band_count,
        config.audio.low_cutoff_hz,
    );
    log::debug!(
        "{} equalizer bands from {:.0} Hz",
        analyzer.band_count(),
        analyzer.band_edges().first().copied().unwrap_or_default()
    );
    let compositor = FrameCompositor::new(gui, &config.lastfm.username, text);
    let mut render = RenderLoop::new(analyzer, compositor, state, gui.fps).with_scrollers(artist, title);

    let mut display = FfplayDisplay::spawn(gui.screen_width, gui.screen_height, gui.fps, gui.fullscreen)?;
    let source = sampler.handle();
    let frames = render.run(&source, &mut display, &shutdown)?;
    log::info!("Rendered {} frames", frames);
    Ok(())
}
