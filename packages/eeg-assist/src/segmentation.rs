use crate::config::SegmentationProfile;
use crate::error::{EegError, Result};
use crate::profile_scope;
use crate::recording::Recording;
use ndarray::Array4;

/// Normalized segment/frame tensor plus the sample ranges it was cut from
#[derive(Debug, Clone)]
pub struct SegmentedRecording {
    /// Shape `(segments, frames, channels, frame_samples)`
    pub frames: Array4<f64>,
    /// Half-open `(start, end)` sample offsets per segment
    pub segment_cuts: Vec<(usize, usize)>,
    pub sfreq: f64,
    pub channel_names: Vec<String>,
}

impl SegmentedRecording {
    pub fn num_segments(&self) -> usize {
        self.frames.shape()[0]
    }

    pub fn num_channels(&self) -> usize {
        self.frames.shape()[2]
    }
}

/// Cuts a recording into fixed-length, non-overlapping segments and frames
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentationEngine;

impl SegmentationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Select channels, crop to whole segments, normalize and frame.
    ///
    /// The recording is modified in place (channel selection and cropping).
    pub fn segment(
        &self,
        recording: &mut Recording,
        profile: &SegmentationProfile,
    ) -> Result<SegmentedRecording> {
        profile_scope!("segmentation");
        profile.validate()?;

        let missing = recording.retain_channels(&profile.common_channels);
        if !missing.is_empty() {
            log::warn!(
                "Recording lacks {} whitelisted channel(s): {:?}",
                missing.len(),
                missing
            );
        }
        if recording.n_channels() == 0 {
            return Err(EegError::InvalidConfig(format!(
                "None of the {} whitelisted channels are present",
                profile.common_channels.len()
            )));
        }

        let sfreq = recording.sampling_frequency();
        let segment_len = profile.segment_len_seconds;
        let step = whole_samples(segment_len as f64, sfreq, "segment")?;
        let frame_step = whole_samples(profile.frame_len_seconds() as f64, sfreq, "frame")?;

        let duration = recording.duration();
        if duration < segment_len as f64 {
            return Err(EegError::TooShortRecording {
                duration,
                segment_len,
            });
        }

        let num_segments = recording.n_times() / step;
        if num_segments == 0 {
            return Err(EegError::TooShortRecording {
                duration,
                segment_len,
            });
        }
        if num_segments * step != recording.n_times() {
            recording.change_duration((num_segments * segment_len as usize) as f64)?;
        }

        let (min, max) = recording.global_min_max();
        if !(max > min) {
            return Err(EegError::DegenerateNormalization { value: max });
        }
        let center = (max + min) / 2.0;
        let half_range = (max - min) / 2.0;

        let segment_cuts: Vec<(usize, usize)> = (0..num_segments)
            .map(|s| (s * step, s * step + step))
            .collect();

        let num_frames = profile.frames_per_segment as usize;
        let num_channels = recording.n_channels();
        let data = recording.to_array();
        let frames = Array4::from_shape_fn(
            (num_segments, num_frames, num_channels, frame_step),
            |(s, f, c, t)| (data[[c, s * step + f * frame_step + t]] - center) / half_range,
        );

        log::info!(
            "Segmented {:.1}s recording into {} segments of {} frames: tensor {:?}",
            recording.duration(),
            num_segments,
            num_frames,
            frames.shape()
        );

        Ok(SegmentedRecording {
            frames,
            segment_cuts,
            sfreq,
            channel_names: recording.channel_names().to_vec(),
        })
    }
}

fn whole_samples(seconds: f64, sfreq: f64, what: &str) -> Result<usize> {
    let exact = seconds * sfreq;
    let rounded = exact.round();
    if (exact - rounded).abs() > 1e-6 || rounded < 1.0 {
        return Err(EegError::InvalidConfig(format!(
            "{}s {} is not a whole number of samples at {} Hz",
            seconds, what, sfreq
        )));
    }
    Ok(rounded as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn profile(channels: &[&str]) -> SegmentationProfile {
        SegmentationProfile {
            common_channels: channels.iter().map(|s| s.to_string()).collect(),
            segment_len_seconds: 16,
            frames_per_segment: 8,
        }
    }

    fn recording(channels: &[&str], seconds: usize, sfreq: f64) -> Recording {
        let n = (seconds as f64 * sfreq) as usize;
        let data = Array2::from_shape_fn((channels.len(), n), |(c, t)| {
            ((t as f64 * 0.3 + c as f64).sin()) * (c + 1) as f64
        });
        Recording::new(channels.iter().map(|s| s.to_string()).collect(), data, sfreq).unwrap()
    }

    #[test]
    fn test_tensor_shape() {
        let chans = ["Fp1", "Fp2", "Cz", "O1"];
        let mut rec = recording(&chans, 48, 10.0);
        let seg = SegmentationEngine::new().segment(&mut rec, &profile(&chans)).unwrap();

        assert_eq!(seg.frames.shape(), &[3, 8, 4, 20]);
        assert_eq!(seg.segment_cuts, vec![(0, 160), (160, 320), (320, 480)]);
        assert_eq!(seg.num_segments(), 3);
    }

    #[test]
    fn test_leftover_is_dropped() {
        let chans = ["Fp1", "Fp2"];
        let mut rec = recording(&chans, 47, 10.0);
        let seg = SegmentationEngine::new().segment(&mut rec, &profile(&chans)).unwrap();

        assert_eq!(seg.num_segments(), 2);
        assert_eq!(rec.n_times(), 320);
        assert_eq!(rec.duration(), 32.0);
    }

    #[test]
    fn test_too_short() {
        let chans = ["Fp1", "Fp2"];
        let mut rec = recording(&chans, 15, 10.0);
        let err = SegmentationEngine::new()
            .segment(&mut rec, &profile(&chans))
            .unwrap_err();
        assert!(matches!(err, EegError::TooShortRecording { segment_len: 16, .. }));
    }

    #[test]
    fn test_invalid_ratio_rejected_before_data() {
        let chans = ["Fp1", "Fp2", "ECG"];
        let mut rec = recording(&chans, 48, 10.0);
        let mut bad = profile(&["Fp1", "Fp2"]);
        bad.frames_per_segment = 5;

        let err = SegmentationEngine::new().segment(&mut rec, &bad).unwrap_err();
        assert!(matches!(err, EegError::InvalidConfig(_)));
        assert_eq!(rec.n_channels(), 3);
    }

    #[test]
    fn test_fractional_frame_samples_rejected() {
        let chans = ["Fp1", "Fp2"];
        let mut rec = recording(&chans, 48, 10.25);
        let err = SegmentationEngine::new()
            .segment(&mut rec, &profile(&chans))
            .unwrap_err();
        assert!(matches!(err, EegError::InvalidConfig(_)));
    }

    #[test]
    fn test_normalization_maps_extremes() {
        let chans = ["Fp1", "Fp2"];
        let mut data = Array2::from_elem((2, 160), 3.0);
        data[[0, 5]] = -7.0;
        data[[1, 150]] = 13.0;
        let mut rec = Recording::new(chans.iter().map(|s| s.to_string()).collect(), data, 10.0)
            .unwrap();

        let seg = SegmentationEngine::new().segment(&mut rec, &profile(&chans)).unwrap();
        // sample 5 -> frame 0, sample 150 -> frame 7 offset 10
        assert!((seg.frames[[0, 0, 0, 5]] + 1.0).abs() < 1e-12);
        assert!((seg.frames[[0, 7, 1, 10]] - 1.0).abs() < 1e-12);
        assert!((seg.frames[[0, 3, 0, 0]] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_signal_is_degenerate() {
        let chans = ["Fp1", "Fp2"];
        let data = Array2::from_elem((2, 160), 1.5);
        let mut rec = Recording::new(chans.iter().map(|s| s.to_string()).collect(), data, 10.0)
            .unwrap();
        let err = SegmentationEngine::new()
            .segment(&mut rec, &profile(&chans))
            .unwrap_err();
        assert!(matches!(err, EegError::DegenerateNormalization { .. }));
    }

    #[test]
    fn test_channel_selection_keeps_recording_order() {
        let mut rec = recording(&["O1", "ECG", "Fp1", "Cz"], 16, 10.0);
        let seg = SegmentationEngine::new()
            .segment(&mut rec, &profile(&["Fp1", "O1", "Cz", "T3"]))
            .unwrap();
        assert_eq!(seg.channel_names, vec!["O1", "Fp1", "Cz"]);
        assert_eq!(seg.num_channels(), 3);
    }
}
