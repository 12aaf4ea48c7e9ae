pub mod features;
pub mod sampler;
pub mod spectrum;
pub mod wav;

use features::AudioBuffer;
use sampler::DeviceError;

/// The two ways the rest of the program pulls audio out of the input device.
pub trait AudioSource: Send {
    fn sample_rate(&self) -> u32;

    /// Latest visualization chunk. Never blocks; may be short or empty.
    fn read_chunk(&self) -> AudioBuffer;

    /// Blocks for roughly `seconds` while collecting fresh samples.
    fn record_fixed_duration(&self, seconds: f32) -> Result<AudioBuffer, DeviceError>;
}
