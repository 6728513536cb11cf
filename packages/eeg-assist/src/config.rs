//! Pipeline configuration
//!
//! Loaded once at startup (JSON file and/or environment), validated, then shared
//! immutably between the pipeline stages.

use crate::error::{EegError, Result};
use crate::types::{Band, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

/// Standard 10-20 montage used by the bundled task setups
pub const DEFAULT_COMMON_CHANNELS: [&str; 19] = [
    "Fp1", "Fp2", "F7", "F3", "Fz", "F4", "F8", "T3", "C3", "Cz", "C4", "T4", "T5", "P3", "Pz",
    "P4", "T6", "O1", "O2",
];

/// Non-EEG channels dropped from every recording at ingest
pub const DEFAULT_EXCLUDE_CHANNELS: [&str; 8] = [
    "ECG", "EKG", "EMG", "BURSTS", "PHOTIC", "IBI", "SUPPR", "RESP",
];

/// Monte Carlo ensemble settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Number of stochastic forward passes per classification
    #[serde(default = "default_monte_carlo_passes")]
    pub monte_carlo_passes: usize,

    /// Segments per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Class index whose probability is reported
    #[serde(default = "default_positive_class")]
    pub positive_class: usize,

    /// Fixed seed for the dropout masks. Unseeded runs are not reproducible.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Run passes concurrently (requires a reentrant model)
    #[serde(default = "default_parallel_passes")]
    pub parallel_passes: bool,
}

fn default_monte_carlo_passes() -> usize {
    100
}
fn default_batch_size() -> usize {
    32
}
fn default_positive_class() -> usize {
    1
}
fn default_parallel_passes() -> bool {
    true
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            monte_carlo_passes: default_monte_carlo_passes(),
            batch_size: default_batch_size(),
            positive_class: default_positive_class(),
            seed: None,
            parallel_passes: default_parallel_passes(),
        }
    }
}

/// Feature extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Ordered band list, one feature column per band
    #[serde(default = "default_bands")]
    pub bands: Vec<Band>,

    /// Sample spacing used when integrating |x| (not the sampling period)
    #[serde(default = "default_integration_step")]
    pub integration_step: f64,

    /// Welch segment length in seconds (clamped to the frame length)
    #[serde(default = "default_welch_window")]
    pub welch_window_seconds: f64,

    /// Report band power as a fraction of 0.5-40 Hz total power
    #[serde(default = "default_relative_band_power")]
    pub relative_band_power: bool,
}

fn default_bands() -> Vec<Band> {
    Band::DEFAULT.to_vec()
}
fn default_integration_step() -> f64 {
    1e-6
}
fn default_welch_window() -> f64 {
    4.0
}
fn default_relative_band_power() -> bool {
    true
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            integration_step: default_integration_step(),
            welch_window_seconds: default_welch_window(),
            relative_band_power: default_relative_band_power(),
        }
    }
}

impl FeatureConfig {
    /// Feature columns emitted per (segment, frame, channel)
    pub fn num_features(&self, num_channels: usize) -> usize {
        7 + self.bands.len() + num_channels
    }
}

/// Immutable per-task segmentation profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationProfile {
    pub common_channels: Vec<String>,
    pub segment_len_seconds: u32,
    pub frames_per_segment: u32,
}

impl SegmentationProfile {
    pub fn validate(&self) -> Result<()> {
        if self.segment_len_seconds == 0 || self.frames_per_segment == 0 {
            return Err(EegError::InvalidConfig(
                "Segment length and frame count must be greater than 0".to_string(),
            ));
        }
        if self.segment_len_seconds % self.frames_per_segment != 0 {
            return Err(EegError::InvalidConfig(format!(
                "Segment length {}s is not divisible by {} frames",
                self.segment_len_seconds, self.frames_per_segment
            )));
        }
        Ok(())
    }

    /// Frame length in whole seconds. Only meaningful after `validate`.
    pub fn frame_len_seconds(&self) -> u32 {
        self.segment_len_seconds / self.frames_per_segment.max(1)
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_exclude_channels")]
    pub exclude_channels: Vec<String>,

    /// Channel whitelist per classification task
    #[serde(default = "default_common_channels")]
    pub common_channels: BTreeMap<TaskType, Vec<String>>,

    #[serde(default = "default_segment_len")]
    pub segment_len_seconds: u32,

    #[serde(default = "default_frames_per_segment")]
    pub frames_per_segment: u32,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub features: FeatureConfig,

    /// Directory holding `<task>.json` model files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Recordings longer than this are rejected at ingest
    #[serde(default = "default_max_duration_minutes")]
    pub max_duration_minutes: Option<f64>,
}

fn default_exclude_channels() -> Vec<String> {
    DEFAULT_EXCLUDE_CHANNELS.iter().map(|s| s.to_string()).collect()
}
fn default_common_channels() -> BTreeMap<TaskType, Vec<String>> {
    TaskType::ALL
        .iter()
        .map(|&task| {
            (
                task,
                DEFAULT_COMMON_CHANNELS.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}
fn default_segment_len() -> u32 {
    16
}
fn default_frames_per_segment() -> u32 {
    8
}
fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eeg-assist")
        .join("models")
}
fn default_max_duration_minutes() -> Option<f64> {
    Some(30.0)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exclude_channels: default_exclude_channels(),
            common_channels: default_common_channels(),
            segment_len_seconds: default_segment_len(),
            frames_per_segment: default_frames_per_segment(),
            classifier: ClassifierConfig::default(),
            features: FeatureConfig::default(),
            model_dir: default_model_dir(),
            max_duration_minutes: default_max_duration_minutes(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EegError::InvalidConfig(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            EegError::InvalidConfig(format!("Cannot parse config {}: {}", path.display(), e))
        })?;
        config.validate()?;

        log::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Build configuration from the environment.
    ///
    /// Reads `.env` if present, starts from `EEG_ASSIST_CONFIG` (or defaults) and then
    /// applies `EEG_ASSIST_MODEL_DIR`, `EEG_ASSIST_MC_PASSES`, `EEG_ASSIST_BATCH_SIZE`
    /// and `EEG_ASSIST_SEED`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match env::var("EEG_ASSIST_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `EEG_ASSIST_*` overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("EEG_ASSIST_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("EEG_ASSIST_MC_PASSES") {
            self.classifier.monte_carlo_passes = parse_override("EEG_ASSIST_MC_PASSES", &value)?;
        }
        if let Some(value) = lookup("EEG_ASSIST_BATCH_SIZE") {
            self.classifier.batch_size = parse_override("EEG_ASSIST_BATCH_SIZE", &value)?;
        }
        if let Some(value) = lookup("EEG_ASSIST_SEED") {
            self.classifier.seed = Some(parse_override("EEG_ASSIST_SEED", &value)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.base_profile().validate()?;

        if self.classifier.monte_carlo_passes == 0 {
            return Err(EegError::InvalidConfig(
                "monte_carlo_passes must be at least 1".to_string(),
            ));
        }
        if self.classifier.batch_size == 0 {
            return Err(EegError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if self.features.bands.is_empty() {
            return Err(EegError::InvalidConfig(
                "At least one frequency band is required".to_string(),
            ));
        }
        let unique: HashSet<Band> = self.features.bands.iter().copied().collect();
        if unique.len() != self.features.bands.len() {
            return Err(EegError::InvalidConfig(
                "Frequency bands must not repeat".to_string(),
            ));
        }
        if !(self.features.integration_step > 0.0 && self.features.integration_step.is_finite()) {
            return Err(EegError::InvalidConfig(format!(
                "integration_step must be positive, got {}",
                self.features.integration_step
            )));
        }
        if !(self.features.welch_window_seconds > 0.0) {
            return Err(EegError::InvalidConfig(format!(
                "welch_window_seconds must be positive, got {}",
                self.features.welch_window_seconds
            )));
        }

        for task in TaskType::ALL {
            match self.common_channels.get(&task) {
                Some(channels) if !channels.is_empty() => {
                    let unique: HashSet<&String> = channels.iter().collect();
                    if unique.len() != channels.len() {
                        return Err(EegError::InvalidConfig(format!(
                            "Duplicate channel names in {} whitelist",
                            task
                        )));
                    }
                }
                _ => {
                    return Err(EegError::InvalidConfig(format!(
                        "Missing channel whitelist for task '{}'",
                        task
                    )))
                }
            }
        }

        if let Some(limit) = self.max_duration_minutes {
            if !(limit > 0.0) {
                return Err(EegError::InvalidConfig(format!(
                    "max_duration_minutes must be positive, got {}",
                    limit
                )));
            }
        }

        Ok(())
    }

    /// Segmentation profile for a task
    pub fn profile(&self, task: TaskType) -> Result<SegmentationProfile> {
        let common_channels = self
            .common_channels
            .get(&task)
            .cloned()
            .ok_or_else(|| {
                EegError::InvalidConfig(format!("Missing channel whitelist for task '{}'", task))
            })?;

        let profile = SegmentationProfile {
            common_channels,
            segment_len_seconds: self.segment_len_seconds,
            frames_per_segment: self.frames_per_segment,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Path of the model file for a task
    pub fn model_path(&self, task: TaskType) -> PathBuf {
        self.model_dir.join(format!("{}.json", task))
    }

    fn base_profile(&self) -> SegmentationProfile {
        SegmentationProfile {
            common_channels: Vec::new(),
            segment_len_seconds: self.segment_len_seconds,
            frames_per_segment: self.frames_per_segment,
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| EegError::InvalidConfig(format!("Invalid value '{}' for {}", value, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.segment_len_seconds, 16);
        assert_eq!(config.frames_per_segment, 8);
        assert_eq!(config.classifier.monte_carlo_passes, 100);
        assert_eq!(config.classifier.batch_size, 32);
        assert_eq!(config.classifier.positive_class, 1);
        assert_eq!(config.features.bands, Band::DEFAULT.to_vec());
    }

    #[test]
    fn test_indivisible_segment_rejected() {
        let config = PipelineConfig {
            frames_per_segment: 7,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EegError::InvalidConfig(_)));
        assert!(config.profile(TaskType::Seizure).is_err());
    }

    #[test]
    fn test_profile_frame_length() {
        let config = PipelineConfig::default();
        let profile = config.profile(TaskType::Abnormal).unwrap();
        assert_eq!(profile.frame_len_seconds(), 2);
        assert_eq!(profile.common_channels.len(), DEFAULT_COMMON_CHANNELS.len());
    }

    #[test]
    fn test_duplicate_bands_rejected() {
        let mut config = PipelineConfig::default();
        config.features.bands = vec![Band::Alpha, Band::Alpha];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "segment_len_seconds": 8,
                "frames_per_segment": 4,
                "classifier": {{ "monte_carlo_passes": 10 }},
                "features": {{ "bands": ["delta", "alpha"] }}
            }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.segment_len_seconds, 8);
        assert_eq!(config.classifier.monte_carlo_passes, 10);
        assert_eq!(config.classifier.batch_size, 32);
        assert_eq!(config.features.bands, vec![Band::Delta, Band::Alpha]);
        assert_eq!(config.features.num_features(4), 7 + 2 + 4);
    }

    #[test]
    fn test_from_file_rejects_bad_ratio() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "segment_len_seconds": 16, "frames_per_segment": 5 }}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(EegError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_overrides_applied() {
        let vars: HashMap<&str, &str> = [
            ("EEG_ASSIST_MODEL_DIR", "/opt/models"),
            ("EEG_ASSIST_MC_PASSES", "25"),
            ("EEG_ASSIST_SEED", "7"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.classifier.monte_carlo_passes, 25);
        assert_eq!(config.classifier.seed, Some(7));
        assert_eq!(config.model_path(TaskType::Seizure), PathBuf::from("/opt/models/seizure.json"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = PipelineConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "EEG_ASSIST_BATCH_SIZE").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }
}
