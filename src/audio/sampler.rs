use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{RecvTimeoutError, Sender};
use thiserror::Error;

use super::features::AudioBuffer;
use super::AudioSource;
use crate::config::AudioConfig;

/// Extra wait on top of the requested duration before a recording is cut short.
const RECORD_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default audio input device is available")]
    NoDevice,
    #[error("audio input device '{0}' was not found")]
    NotFound(String),
    #[error("failed to query audio input devices: {0}")]
    Query(String),
    #[error("input device '{device}' cannot capture at {sample_rate} Hz")]
    UnsupportedRate { device: String, sample_rate: u32 },
    #[error("unsupported input sample format {0}")]
    UnsupportedFormat(String),
    #[error("failed to open input stream: {0}")]
    Open(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    Start(#[from] cpal::PlayStreamError),
    #[error("input stream delivered no samples")]
    Stalled,
}

/// State shared between the cpal callback and every handle.
struct CaptureShared {
    recent: Mutex<VecDeque<i16>>,
    tap: Mutex<Option<Sender<Vec<i16>>>>,
    capacity: usize,
}

impl CaptureShared {
    fn new(capacity: usize) -> Self {
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            tap: Mutex::new(None),
            capacity,
        }
    }

    fn push(&self, block: Vec<i16>) {
        {
            let mut recent = lock(&self.recent);
            recent.extend(block.iter().copied());
            let excess = recent.len().saturating_sub(self.capacity);
            recent.drain(..excess);
        }
        let mut tap = lock(&self.tap);
        if let Some(sender) = tap.as_ref() {
            if sender.send(block).is_err() {
                *tap = None;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the single input stream. Dropping it closes the device.
pub struct AudioSampler {
    _stream: cpal::Stream,
    handle: SamplerHandle,
    device_name: String,
}

impl AudioSampler {
    pub fn open(config: &AudioConfig) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = match config.device.as_deref() {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| DeviceError::Query(e.to_string()))?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| DeviceError::NotFound(wanted.to_string()))?,
            None => host.default_input_device().ok_or(DeviceError::NoDevice)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "unknown".into());

        // fewest channels that can run at the configured rate
        let rate = config.sample_rate;
        let supported = device
            .supported_input_configs()
            .map_err(|e| DeviceError::Query(e.to_string()))?
            .filter(|c| c.min_sample_rate().0 <= rate && rate <= c.max_sample_rate().0)
            .min_by_key(|c| c.channels())
            .ok_or_else(|| DeviceError::UnsupportedRate {
                device: device_name.clone(),
                sample_rate: rate,
            })?
            .with_sample_rate(cpal::SampleRate(rate));

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.config();
        let channels = stream_config.channels.max(1) as usize;

        let handle = SamplerHandle::new(rate, config.chunk_size);
        let shared = handle.shared.clone();
        let stream = match sample_format {
            cpal::SampleFormat::I8 => build_stream::<i8>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::U8 => build_stream::<u8>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::U32 => build_stream::<u32>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, shared)?,
            cpal::SampleFormat::F64 => build_stream::<f64>(&device, &stream_config, channels, shared)?,
            other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
        };
        stream.play()?;

        log::info!(
            "Audio input: {} @ {} Hz, {} channel(s), {:?}",
            device_name,
            rate,
            channels,
            sample_format
        );

        Ok(Self {
            _stream: stream,
            handle,
            device_name,
        })
    }

    pub fn handle(&self) -> SamplerHandle {
        self.handle.clone()
    }
}

impl Drop for AudioSampler {
    fn drop(&mut self) {
        log::debug!("Closing audio input '{}'", self.device_name);
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    shared: Arc<CaptureShared>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // first channel only
            let block: Vec<i16> = data
                .chunks(channels)
                .filter_map(|frame| frame.first())
                .map(|&s| i16::from_sample(s))
                .collect();
            shared.push(block);
        },
        |err| log::warn!("Audio input stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::Query(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Cheap, `Send` view onto the running capture; one per consuming thread.
#[derive(Clone)]
pub struct SamplerHandle {
    shared: Arc<CaptureShared>,
    sample_rate: u32,
    chunk_size: usize,
    record_grace: Duration,
}

impl SamplerHandle {
    fn new(sample_rate: u32, chunk_size: usize) -> Self {
        let capacity = (chunk_size * 4).max(1);
        Self {
            shared: Arc::new(CaptureShared::new(capacity)),
            sample_rate,
            chunk_size,
            record_grace: RECORD_GRACE,
        }
    }
}

impl AudioSource for SamplerHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_chunk(&self) -> AudioBuffer {
        let recent = lock(&self.shared.recent);
        let start = recent.len().saturating_sub(self.chunk_size);
        AudioBuffer::new(recent.iter().skip(start).copied().collect(), self.sample_rate)
    }

    fn record_fixed_duration(&self, seconds: f32) -> Result<AudioBuffer, DeviceError> {
        let wanted = (seconds.max(0.0) * self.sample_rate as f32).round() as usize;
        let (tx, rx) = crossbeam_channel::unbounded();
        *lock(&self.shared.tap) = Some(tx);

        let deadline = Instant::now() + Duration::from_secs_f32(seconds.max(0.0)) + self.record_grace;
        let mut samples = Vec::with_capacity(wanted);
        while samples.len() < wanted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(block) => samples.extend(block),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        *lock(&self.shared.tap) = None;

        if samples.is_empty() && wanted > 0 {
            return Err(DeviceError::Stalled);
        }
        if samples.len() < wanted {
            log::warn!(
                "Recording cut short: {} of {} samples",
                samples.len(),
                wanted
            );
        }
        samples.truncate(wanted);
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn handle(sample_rate: u32, chunk: usize) -> SamplerHandle {
        let mut handle = SamplerHandle::new(sample_rate, chunk);
        handle.record_grace = Duration::from_millis(100);
        handle
    }

    #[test]
    fn read_chunk_returns_latest_samples() {
        let h = handle(8000, 4);
        h.shared.push(vec![1, 2, 3]);
        h.shared.push(vec![4, 5, 6]);
        assert_eq!(h.read_chunk().samples, vec![3, 4, 5, 6]);
    }

    #[test]
    fn read_chunk_underflow_returns_what_is_buffered() {
        let h = handle(8000, 1024);
        assert!(h.read_chunk().is_empty());
        h.shared.push(vec![9, 9]);
        assert_eq!(h.read_chunk().samples, vec![9, 9]);
    }

    #[test]
    fn history_is_bounded() {
        let h = handle(8000, 2);
        for _ in 0..10 {
            h.shared.push(vec![1; 5]);
        }
        assert_eq!(lock(&h.shared.recent).len(), 8);
    }

    #[test]
    fn record_collects_requested_duration_from_live_blocks() {
        let h = handle(1000, 16);
        let feeder = h.clone();
        let producer = thread::spawn(move || {
            while lock(&feeder.shared.tap).is_none() {
                thread::sleep(Duration::from_millis(1));
            }
            for i in 0..40 {
                feeder.shared.push(vec![i as i16; 10]);
                thread::sleep(Duration::from_millis(2));
            }
        });
        let recording = h.record_fixed_duration(0.1).unwrap();
        producer.join().unwrap();
        assert_eq!(recording.len(), 100);
        assert_eq!(recording.sample_rate, 1000);
        assert!(lock(&h.shared.tap).is_none());
    }

    #[test]
    fn record_on_silent_stream_reports_stall() {
        let h = handle(1000, 16);
        let err = h.record_fixed_duration(0.01).unwrap_err();
        assert!(matches!(err, DeviceError::Stalled));
    }
}
