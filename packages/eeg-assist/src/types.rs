use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification task a model was trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Abnormal,
    Seizure,
    Artifact,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Abnormal, TaskType::Seizure, TaskType::Artifact];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Abnormal => "abnormal",
            TaskType::Seizure => "seizure",
            TaskType::Artifact => "artifact",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abnormal" => Ok(TaskType::Abnormal),
            "seizure" => Ok(TaskType::Seizure),
            "artifact" => Ok(TaskType::Artifact),
            other => Err(format!(
                "Unknown task '{}'. Valid tasks: abnormal, seizure, artifact",
                other
            )),
        }
    }
}

/// Named EEG frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Sigma,
    Beta,
    Gamma,
}

impl Band {
    /// Full band table, ordered by frequency. Relative band power is taken
    /// against the span from the first lower edge to the last upper edge.
    pub const TABLE: [Band; 6] = [
        Band::Delta,
        Band::Theta,
        Band::Alpha,
        Band::Sigma,
        Band::Beta,
        Band::Gamma,
    ];

    /// Default band selection fed to the classifiers
    pub const DEFAULT: [Band; 4] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta];

    /// Lower (inclusive) and upper (exclusive) edge in Hz
    pub fn range_hz(&self) -> (f64, f64) {
        match self {
            Band::Delta => (0.5, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 12.0),
            Band::Sigma => (12.0, 16.0),
            Band::Beta => (16.0, 30.0),
            Band::Gamma => (30.0, 40.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "Delta",
            Band::Theta => "Theta",
            Band::Alpha => "Alpha",
            Band::Sigma => "Sigma",
            Band::Beta => "Beta",
            Band::Gamma => "Gamma",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::TABLE
            .iter()
            .find(|band| band.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| {
                format!(
                    "Unknown band '{}'. Valid bands: Delta, Theta, Alpha, Sigma, Beta, Gamma",
                    s
                )
            })
    }
}

/// One classified segment of a recording, as handed to the report store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSegment {
    pub nr: usize,
    #[serde(rename = "prob")]
    pub probability_mean: f64,
    #[serde(rename = "std")]
    pub probability_std: f64,
    pub start_time: u64,
    pub stop_time: u64,
}

/// Ordered report produced by one successful classification job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(rename = "type")]
    pub task: TaskType,
    pub segments: Vec<ClassificationSegment>,
}

/// Subject metadata carried by some recordings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub birthday: Option<DateTime<Utc>>,
    pub sex: Option<i32>,
    pub hand: Option<i32>,
}

/// Recording summary persisted alongside reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub meas_date: Option<DateTime<Utc>>,
    pub highpass: Option<f64>,
    pub lowpass: Option<f64>,
    pub n_times: usize,
    pub sfreq: f64,
    pub ch_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_round_trips_through_str() {
        for task in TaskType::ALL {
            assert_eq!(task.as_str().parse::<TaskType>().unwrap(), task);
        }
        assert!("sleep".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_band_parse_is_case_insensitive() {
        assert_eq!("alpha".parse::<Band>().unwrap(), Band::Alpha);
        assert_eq!("BETA".parse::<Band>().unwrap(), Band::Beta);
        assert!("kappa".parse::<Band>().is_err());
    }

    #[test]
    fn test_segment_serializes_to_wire_names() {
        let segment = ClassificationSegment {
            nr: 0,
            probability_mean: 0.95,
            probability_std: 0.006,
            start_time: 0,
            stop_time: 16,
        };
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json["prob"], 0.95);
        assert_eq!(json["std"], 0.006);
        assert_eq!(json["stop_time"], 16);
    }
}
