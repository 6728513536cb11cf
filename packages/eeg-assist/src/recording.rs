use crate::dsp;
use crate::error::{EegError, Result};
use crate::types::{RecordingInfo, SubjectInfo};
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::collections::HashSet;

/// In-memory multi-channel recording, channels x samples
#[derive(Debug, Clone)]
pub struct Recording {
    channel_names: Vec<String>,
    data: Array2<f64>,
    sfreq: f64,
    subject: Option<SubjectInfo>,
    meas_date: Option<DateTime<Utc>>,
    highpass: Option<f64>,
    lowpass: Option<f64>,
}

impl Recording {
    pub fn new(channel_names: Vec<String>, data: Array2<f64>, sfreq: f64) -> Result<Self> {
        if channel_names.len() != data.nrows() {
            return Err(EegError::ChannelDecode(format!(
                "{} channel names for {} data rows",
                channel_names.len(),
                data.nrows()
            )));
        }
        if channel_names.is_empty() {
            return Err(EegError::ChannelDecode("Recording has no channels".to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = channel_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(EegError::ChannelDecode(format!(
                "Duplicate channel name '{}'",
                duplicate
            )));
        }

        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(EegError::ChannelDecode(format!(
                "Invalid sampling frequency {}",
                sfreq
            )));
        }
        if data.ncols() == 0 {
            return Err(EegError::ChannelDecode("Recording has no samples".to_string()));
        }

        Ok(Self {
            channel_names,
            data,
            sfreq,
            subject: None,
            meas_date: None,
            highpass: None,
            lowpass: None,
        })
    }

    pub fn with_subject(mut self, subject: SubjectInfo) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_meas_date(mut self, meas_date: DateTime<Utc>) -> Self {
        self.meas_date = Some(meas_date);
        self
    }

    pub fn with_filter_band(mut self, highpass: Option<f64>, lowpass: Option<f64>) -> Self {
        self.highpass = highpass;
        self.lowpass = lowpass;
        self
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn sampling_frequency(&self) -> f64 {
        self.sfreq
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    pub fn subject(&self) -> Option<&SubjectInfo> {
        self.subject.as_ref()
    }

    pub fn to_array(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn info(&self) -> RecordingInfo {
        RecordingInfo {
            meas_date: self.meas_date,
            highpass: self.highpass,
            lowpass: self.lowpass,
            n_times: self.n_times(),
            sfreq: self.sfreq,
            ch_names: self.channel_names.clone(),
        }
    }

    /// Remove the named channels, keeping the original order of the rest.
    /// Names not present in the recording are ignored.
    pub fn drop_channels<S: AsRef<str>>(&mut self, names: &[S]) {
        let drop: HashSet<&str> = names.iter().map(|s| s.as_ref()).collect();
        let keep: Vec<usize> = self
            .channel_names
            .iter()
            .enumerate()
            .filter(|(_, name)| !drop.contains(name.as_str()))
            .map(|(idx, _)| idx)
            .collect();

        if keep.len() == self.channel_names.len() {
            return;
        }

        log::debug!(
            "Dropping {} channel(s), {} remain",
            self.channel_names.len() - keep.len(),
            keep.len()
        );

        self.data = self.data.select(Axis(0), &keep);
        self.channel_names = keep
            .iter()
            .map(|&idx| self.channel_names[idx].clone())
            .collect();
    }

    /// Drop every channel on the global exclusion list
    pub fn exclude_channels<S: AsRef<str>>(&mut self, excluded: &[S]) {
        let present: Vec<String> = excluded
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| self.channel_names.iter().any(|c| c == name))
            .map(str::to_string)
            .collect();

        if !present.is_empty() {
            log::info!("Excluding non-EEG channels: {:?}", present);
            self.drop_channels(&present);
        }
    }

    /// Keep only whitelisted channels, in recording order.
    /// Returns the whitelisted names the recording does not carry.
    pub fn retain_channels<S: AsRef<str>>(&mut self, whitelist: &[S]) -> Vec<String> {
        let allowed: HashSet<&str> = whitelist.iter().map(|s| s.as_ref()).collect();
        let extra: Vec<String> = self
            .channel_names
            .iter()
            .filter(|name| !allowed.contains(name.as_str()))
            .cloned()
            .collect();
        self.drop_channels(&extra);

        whitelist
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| !self.channel_names.iter().any(|c| c == name))
            .map(str::to_string)
            .collect()
    }

    /// Truncate to [0, new_duration) seconds
    pub fn change_duration(&mut self, new_duration: f64) -> Result<()> {
        if !(new_duration > 0.0) {
            return Err(EegError::InvalidConfig(format!(
                "Target duration must be positive, got {}",
                new_duration
            )));
        }
        if new_duration > self.duration() {
            return Err(EegError::InvalidConfig(format!(
                "Target duration {}s exceeds recording duration {}s",
                new_duration,
                self.duration()
            )));
        }

        let exact = new_duration * self.sfreq;
        let n_samples = exact.round();
        if (exact - n_samples).abs() > 1e-6 {
            return Err(EegError::InvalidConfig(format!(
                "Duration {}s is not a whole number of samples at {} Hz",
                new_duration, self.sfreq
            )));
        }

        let n_samples = n_samples as usize;
        if n_samples < self.n_times() {
            log::debug!(
                "Cropping recording from {} to {} samples",
                self.n_times(),
                n_samples
            );
            self.data = self.data.slice(ndarray::s![.., ..n_samples]).to_owned();
        }
        Ok(())
    }

    /// Fourier-domain resampling of every channel to `new_sfreq`
    pub fn resample(&mut self, new_sfreq: f64) -> Result<()> {
        if !(new_sfreq.is_finite() && new_sfreq > 0.0) {
            return Err(EegError::InvalidConfig(format!(
                "Target sampling frequency must be positive, got {}",
                new_sfreq
            )));
        }
        if (new_sfreq - self.sfreq).abs() < f64::EPSILON {
            return Ok(());
        }

        let num = (self.n_times() as f64 * new_sfreq / self.sfreq).round() as usize;
        if num == 0 {
            return Err(EegError::InvalidConfig(format!(
                "Resampling to {} Hz leaves no samples",
                new_sfreq
            )));
        }

        log::info!(
            "Resampling {} channels from {} Hz to {} Hz ({} -> {} samples)",
            self.n_channels(),
            self.sfreq,
            new_sfreq,
            self.n_times(),
            num
        );

        let data = &self.data;
        let rows: Vec<Vec<f64>> = (0..data.nrows())
            .into_par_iter()
            .map(|ch| {
                let row: Vec<f64> = data.row(ch).iter().copied().collect();
                dsp::resample(&row, num)
            })
            .collect();

        let n_channels = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        self.data = Array2::from_shape_vec((n_channels, num), flat)
            .map_err(|e| EegError::ShapeMismatch(e.to_string()))?;
        self.sfreq = new_sfreq;
        Ok(())
    }

    /// Minimum and maximum over the whole matrix
    pub fn global_min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            })
    }

    /// Reject recordings longer than `limit_minutes` (rounded up to whole minutes)
    pub fn check_max_duration(&self, limit_minutes: f64) -> Result<()> {
        let minutes = (self.duration() / 60.0).ceil() as u64;
        if minutes as f64 > limit_minutes {
            return Err(EegError::DurationExceeded {
                minutes,
                limit: limit_minutes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_recording() -> Recording {
        let data = Array2::from_shape_fn((4, 100), |(c, t)| (c * 1000 + t) as f64);
        Recording::new(names(&["Fp1", "ECG", "Cz", "O2"]), data, 10.0).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_input() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            Recording::new(names(&["A"]), data.clone(), 10.0),
            Err(EegError::ChannelDecode(_))
        ));
        assert!(Recording::new(names(&["A", "A"]), data.clone(), 10.0).is_err());
        assert!(Recording::new(names(&["A", "B"]), data.clone(), 0.0).is_err());
        assert!(Recording::new(names(&["A", "B"]), data, f64::NAN).is_err());
    }

    #[test]
    fn test_drop_channels_preserves_order() {
        let mut rec = sample_recording();
        rec.drop_channels(&["Cz", "missing"]);
        assert_eq!(rec.channel_names(), &names(&["Fp1", "ECG", "O2"])[..]);
        assert_eq!(rec.to_array()[[2, 0]], 3000.0);
    }

    #[test]
    fn test_exclude_and_retain_channels() {
        let mut rec = sample_recording();
        rec.exclude_channels(&["ECG", "EMG"]);
        assert_eq!(rec.n_channels(), 3);

        let missing = rec.retain_channels(&["O2", "Fp1", "T3"]);
        assert_eq!(rec.channel_names(), &names(&["Fp1", "O2"])[..]);
        assert_eq!(missing, vec!["T3".to_string()]);
    }

    #[test]
    fn test_change_duration() {
        let mut rec = sample_recording();
        rec.change_duration(4.0).unwrap();
        assert_eq!(rec.n_times(), 40);
        assert_eq!(rec.duration(), 4.0);

        assert!(matches!(rec.change_duration(0.0), Err(EegError::InvalidConfig(_))));
        assert!(rec.change_duration(-1.0).is_err());
        assert!(rec.change_duration(5.0).is_err());
        assert!(rec.change_duration(1.05).is_err());
    }

    #[test]
    fn test_resample_updates_counts() {
        let mut rec = sample_recording();
        rec.resample(5.0).unwrap();
        assert_eq!(rec.sampling_frequency(), 5.0);
        assert_eq!(rec.n_times(), 50);
        assert_eq!(rec.duration(), 10.0);
        assert!(rec.resample(-1.0).is_err());
    }

    #[test]
    fn test_global_min_max_spans_all_channels() {
        let rec = sample_recording();
        assert_eq!(rec.global_min_max(), (0.0, 3099.0));
    }

    #[test]
    fn test_max_duration() {
        let data = Array2::zeros((2, 10 * 61));
        let rec = Recording::new(names(&["A", "B"]), data, 10.0).unwrap();
        assert!(rec.check_max_duration(2.0).is_ok());
        assert!(matches!(
            rec.check_max_duration(1.0),
            Err(EegError::DurationExceeded { minutes: 2, .. })
        ));
    }
}
