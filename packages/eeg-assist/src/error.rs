use crate::types::TaskType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EegError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Recording too short: {duration:.3}s is below one {segment_len}s segment")]
    TooShortRecording { duration: f64, segment_len: u32 },

    #[error("Cannot normalize signal with zero dynamic range (min = max = {value})")]
    DegenerateNormalization { value: f64 },

    #[error("Failed to decode recording: {0}")]
    ChannelDecode(String),

    #[error("Failed to load {task} model: {reason}")]
    ModelLoad { task: TaskType, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Recording duration {minutes} min exceeds the {limit} min limit")]
    DurationExceeded { minutes: u64, limit: f64 },

    #[error("No {task} report stored for recording {recording_id}")]
    ReportNotFound { recording_id: String, task: TaskType },

    #[error("Invalid recording id '{0}': must be a single path component")]
    InvalidRecordingId(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EegError>;
