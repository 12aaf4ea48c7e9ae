/// Mono signed 16-bit PCM, as delivered by the sampler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds at the buffer's sample rate.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Per-band summed FFT magnitudes (linear, unnormalized), lowest band first.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyBands {
    pub magnitudes: Vec<f32>,
}

impl FrequencyBands {
    pub fn silent(band_count: usize) -> Self {
        Self {
            magnitudes: vec![0.0; band_count],
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    /// Index of the band with the largest magnitude, or `None` when every band is zero.
    pub fn dominant(&self) -> Option<usize> {
        let (idx, max) = self
            .magnitudes
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, 0.0f32), |best, (i, m)| if m > best.1 { (i, m) } else { best });
        if max > 0.0 {
            Some(idx)
        } else {
            None
        }
    }
}
