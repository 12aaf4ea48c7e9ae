pub mod ffplay;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to start {program}: {source}. Is it installed?")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("display window was closed")]
    Closed,
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("display I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Somewhere finished RGBA frames go.
pub trait FrameSink {
    fn present(&mut self, rgba: &[u8]) -> Result<(), DisplayError>;
}
