use crate::dsp::{self, Spectrum};
use crate::types::Band;

/// Frequency span relative band powers are normalized against
pub const TOTAL_POWER_RANGE_HZ: (f64, f64) = (0.5, 40.0);

/// Welch-based band power estimator for a single channel
#[derive(Debug, Clone)]
pub struct BandPowerEstimator {
    bands: Vec<Band>,
    sfreq: f64,
    window_samples: usize,
    relative: bool,
}

impl BandPowerEstimator {
    pub fn new(bands: Vec<Band>, sfreq: f64, window_seconds: f64, relative: bool) -> Self {
        let window_samples = (window_seconds * sfreq).round().max(1.0) as usize;
        Self {
            bands,
            sfreq,
            window_samples,
            relative,
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn spectrum(&self, signal: &[f64]) -> Spectrum {
        dsp::welch(signal, self.sfreq, self.window_samples)
    }

    /// One power value per configured band, in band order
    pub fn band_powers(&self, signal: &[f64]) -> Vec<f64> {
        let spectrum = self.spectrum(signal);

        let total = if self.relative {
            let (lo, hi) = TOTAL_POWER_RANGE_HZ;
            spectrum.integrate(|f| f >= lo && f <= hi)
        } else {
            1.0
        };

        self.bands
            .iter()
            .map(|band| {
                let (low, high) = band.range_hz();
                spectrum.integrate(|f| f >= low && f < high) / total
            })
            .collect()
    }
}
