use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "earmark",
    version,
    about = "Listens to the room, recognizes what is playing, scrobbles it to Last.fm and shows a live equalizer"
)]
pub struct Cli {
    /// Config file (TOML, or JSON by extension). Defaults to earmark.toml, config.json, then the user config dir
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run recognition and scrobbling only, without a display
    #[arg(long)]
    pub headless: bool,

    /// List audio input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Input device name, as printed by --list-devices
    #[arg(short, long)]
    pub device: Option<String>,

    /// Open a window instead of going fullscreen
    #[arg(long)]
    pub windowed: bool,

    /// Seconds of audio sent per recognition attempt
    #[arg(long)]
    pub record_seconds: Option<f32>,

    /// Number of equalizer bands
    #[arg(long)]
    pub bands: Option<usize>,
}

impl Cli {
    /// Flags given on the command line override the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(seconds) = self.record_seconds {
            config.audio.record_seconds = seconds;
        }
        if let Some(bands) = self.bands {
            config.audio.band_count = bands;
        }
        if self.windowed {
            config.gui.fullscreen = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "earmark",
            "--device",
            "USB",
            "--windowed",
            "--record-seconds",
            "6.5",
            "--bands",
            "64",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.audio.device.as_deref(), Some("USB"));
        assert!(!config.gui.fullscreen);
        assert_eq!(config.audio.record_seconds, 6.5);
        assert_eq!(config.audio.band_count, 64);
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let cli = Cli::parse_from(["earmark", "--headless"]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert!(cli.headless);
        assert!(config.gui.fullscreen);
        assert_eq!(config.audio.band_count, 200);
        assert_eq!(config.audio.device, None);
    }
}
