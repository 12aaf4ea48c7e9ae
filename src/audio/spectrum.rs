use rustfft::{num_complex::Complex, FftPlanner};

use super::features::FrequencyBands;

pub const DEFAULT_LOW_CUTOFF_HZ: f64 = 200.0;

/// Turns PCM chunks into log-spaced band magnitudes for the equalizer.
///
/// Band edges run logarithmically from the low cutoff to the Nyquist frequency. Each band is the
/// plain sum of the FFT magnitudes whose bin frequency lies in `[start, end)`; negative-frequency
/// bins are ignored. FFT plans are cached per chunk length, so repeated calls with the same
/// chunk size do not re-plan.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
    sample_rate: u32,
    edges: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32, band_count: usize, low_cutoff_hz: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            sample_rate,
            edges: log_band_edges(low_cutoff_hz, sample_rate, band_count),
        }
    }

    pub fn band_count(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn band_edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn analyze(&mut self, samples: &[i16]) -> FrequencyBands {
        let mut bands = FrequencyBands::silent(self.band_count());
        let n = samples.len();
        if n == 0 || bands.len() == 0 {
            return bands;
        }

        let fft = self.planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .map(|&s| Complex::new(s as f32, 0.0))
            .collect();
        fft.process(&mut buffer);

        // fftfreq layout: indices 0..=(n-1)/2 carry the non-negative frequencies
        let positive = (n + 1) / 2;
        let resolution = self.sample_rate as f64 / n as f64;
        for (k, coeff) in buffer[..positive].iter().enumerate() {
            let freq = k as f64 * resolution;
            if let Some(band) = self.band_of(freq) {
                bands.magnitudes[band] += coeff.norm();
            }
        }

        bands
    }

    fn band_of(&self, freq: f64) -> Option<usize> {
        let first = *self.edges.first()?;
        let last = *self.edges.last()?;
        if !(first < last) || freq < first || freq >= last {
            return None;
        }
        Some(self.edges.partition_point(|&edge| edge <= freq) - 1)
    }
}

/// One-shot analysis; builds a fresh planner on every call.
pub fn frequency_bands(
    samples: &[i16],
    sample_rate: u32,
    band_count: usize,
    low_cutoff_hz: f64,
) -> FrequencyBands {
    SpectrumAnalyzer::new(sample_rate, band_count, low_cutoff_hz).analyze(samples)
}

/// `band_count + 1` edges spaced evenly in log10 between `low_hz` and the Nyquist frequency.
pub fn log_band_edges(low_hz: f64, sample_rate: u32, band_count: usize) -> Vec<f64> {
    if band_count == 0 {
        return Vec::new();
    }
    let nyquist = (sample_rate / 2) as f64;
    let lo = low_hz.max(f64::MIN_POSITIVE).log10();
    let hi = nyquist.max(f64::MIN_POSITIVE).log10();
    let step = (hi - lo) / band_count as f64;
    (0..=band_count)
        .map(|i| 10f64.powf(lo + step * i as f64))
        .collect()
}
