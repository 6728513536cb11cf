use super::spectral::BandPowerEstimator;
use super::statistics;
use crate::config::FeatureConfig;
use crate::error::{EegError, Result};
use crate::profile_scope;
use ndarray::{s, stack, Array2, Array3, Array4, ArrayView2, ArrayView4, Axis};
use rayon::prelude::*;

/// Number of scalar statistics between the correlation row and the band powers
pub const NUM_SCALAR_FEATURES: usize = 7;

/// Per-frame, per-channel feature extraction.
///
/// Column layout for a frame with `C` channels and `B` bands:
/// `[spearman row (C) | mean | variance | skewness | kurtosis | zero crossings |
/// absolute area | peak-to-peak | band powers (B)]`.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    band_power: BandPowerEstimator,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig, sfreq: f64) -> Self {
        let band_power = BandPowerEstimator::new(
            config.bands.clone(),
            sfreq,
            config.welch_window_seconds,
            config.relative_band_power,
        );
        Self { config, band_power }
    }

    pub fn num_features(&self, num_channels: usize) -> usize {
        self.config.num_features(num_channels)
    }

    /// Feature names in column order
    pub fn feature_names(&self, channel_names: &[String]) -> Vec<String> {
        let mut names: Vec<String> = channel_names
            .iter()
            .map(|ch| format!("spearman_{}", ch))
            .collect();
        names.extend(
            [
                "mean",
                "variance",
                "skewness",
                "kurtosis",
                "zero_crossings",
                "absolute_area",
                "peak_to_peak",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        names.extend(
            self.config
                .bands
                .iter()
                .map(|b| format!("{}_power", b.name().to_lowercase())),
        );
        names
    }

    /// `(segments, frames, channels, time)` -> `(segments, frames, channels, features)`
    pub fn extract(&self, frames: ArrayView4<'_, f64>) -> Result<Array4<f64>> {
        profile_scope!("feature extraction");

        let (num_segments, num_frames, num_channels, _) = frames.dim();
        if num_channels < 2 {
            return Err(EegError::InvalidConfig(format!(
                "Feature extraction needs at least 2 channels, got {}",
                num_channels
            )));
        }
        log::debug!("Feature extraction input shape: {:?}", frames.shape());

        let segments: Vec<Array3<f64>> = (0..num_segments)
            .into_par_iter()
            .map(|seg| {
                let per_frame: Vec<Array2<f64>> = (0..num_frames)
                    .map(|f| self.frame_features(frames.slice(s![seg, f, .., ..])))
                    .collect();
                let views: Vec<ArrayView2<'_, f64>> = per_frame.iter().map(|a| a.view()).collect();
                stack(Axis(0), &views).map_err(|e| EegError::ShapeMismatch(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let views: Vec<_> = segments.iter().map(|a| a.view()).collect();
        let features = stack(Axis(0), &views).map_err(|e| EegError::ShapeMismatch(e.to_string()))?;

        if features.shape()[..3] != frames.shape()[..3] {
            return Err(EegError::ShapeMismatch(format!(
                "Feature tensor {:?} does not match frame tensor {:?}",
                features.shape(),
                frames.shape()
            )));
        }

        let non_finite = features.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            log::warn!(
                "{} of {} feature values are not finite",
                non_finite,
                features.len()
            );
        }

        log::info!("Extracted feature tensor {:?}", features.shape());
        Ok(features)
    }

    /// Features of one channels x time frame, channels x features
    pub fn frame_features(&self, frame: ArrayView2<'_, f64>) -> Array2<f64> {
        let num_channels = frame.nrows();
        let width = self.num_features(num_channels);
        let correlation = statistics::spearman_matrix(frame);

        let mut out = Array2::from_elem((num_channels, width), f64::NAN);
        for (c, row) in frame.outer_iter().enumerate() {
            let x = row.to_vec();
            let mut values: Vec<f64> = correlation.row(c).to_vec();
            values.extend([
                statistics::mean(&x),
                statistics::variance(&x),
                statistics::skewness(&x),
                statistics::kurtosis(&x),
                statistics::zero_crossings(&x),
                statistics::absolute_area(&x, self.config.integration_step),
                statistics::peak_to_peak(&x),
            ]);
            values.extend(self.band_power.band_powers(&x));

            for (slot, value) in out.row_mut(c).iter_mut().zip(values) {
                *slot = value;
            }
        }
        out
    }
}
