use std::io::{ErrorKind, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use super::{DisplayError, FrameSink};

/// Live window fed with raw RGBA video on stdin. Closing the window ends the stream.
pub struct FfplayDisplay {
    child: Child,
    stdin: Option<ChildStdin>,
    frame_len: usize,
}

pub fn ffplay_args(width: u32, height: u32, fps: u32, fullscreen: bool) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".into(), "error".into(),
        "-window_title".into(), "earmark".into(),
        "-fflags".into(), "nobuffer".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", width, height),
        "-framerate".into(), fps.to_string(),
    ];
    if fullscreen {
        args.push("-fs".into());
    }
    args.extend(["-i".to_string(), "pipe:0".to_string()]);
    args
}

impl FfplayDisplay {
    pub fn spawn(width: u32, height: u32, fps: u32, fullscreen: bool) -> Result<Self, DisplayError> {
        Self::spawn_program("ffplay", &ffplay_args(width, height, fps, fullscreen), width, height)
    }

    fn spawn_program(
        program: &str,
        args: &[String],
        width: u32,
        height: u32,
    ) -> Result<Self, DisplayError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DisplayError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let stdin = child.stdin.take();
        log::info!("Display started: {} {}x{}", program, width, height);
        Ok(Self {
            child,
            stdin,
            frame_len: (width * height * 4) as usize,
        })
    }
}

impl FrameSink for FfplayDisplay {
    fn present(&mut self, rgba: &[u8]) -> Result<(), DisplayError> {
        if rgba.len() != self.frame_len {
            return Err(DisplayError::FrameSize {
                expected: self.frame_len,
                actual: rgba.len(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or(DisplayError::Closed)?;
        match stdin.write_all(rgba) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                self.stdin = None;
                Err(DisplayError::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FfplayDisplay {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        log::debug!("Display closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_describe_raw_rgba_input() {
        let args = ffplay_args(1280, 720, 60, false);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pixel_format rgba -video_size 1280x720 -framerate 60"));
        assert_eq!(args[args.len() - 2..], ["-i".to_string(), "pipe:0".to_string()]);
        assert!(!args.contains(&"-fs".to_string()));
        assert!(ffplay_args(1280, 720, 60, true).contains(&"-fs".to_string()));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = FfplayDisplay::spawn_program("earmark-no-such-player", &[], 2, 2)
            .err()
            .unwrap();
        assert!(matches!(err, DisplayError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn exited_reader_reports_closed() {
        // `true` exits at once without reading, like a window the user closed.
        let mut display = FfplayDisplay::spawn_program("true", &[], 64, 64).unwrap();
        let _ = display.child.wait();
        let frame = vec![0u8; 64 * 64 * 4];
        let mut result = Ok(());
        for _ in 0..8 {
            result = display.present(&frame);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(DisplayError::Closed)));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_wrong_frame_size() {
        let mut display = FfplayDisplay::spawn_program("cat", &[], 2, 2).unwrap();
        assert!(matches!(
            display.present(&[0u8; 3]),
            Err(DisplayError::FrameSize { expected: 16, actual: 3 })
        ));
    }
}
