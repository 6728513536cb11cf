use crate::types::{ClassificationReport, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Status of a classification job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Registered, not started
    Pending,
    Running,
    /// Report stored
    Success,
    /// Failed, nothing stored
    Failure,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// One classification of one recording for one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationJob {
    pub id: Uuid,
    pub recording_id: String,
    pub task: TaskType,
    pub status: JobStatus,
    /// Error message (when failed)
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ClassificationJob {
    pub fn new(recording_id: impl Into<String>, task: TaskType) -> Self {
        Self {
            id: Uuid::new_v4(),
            recording_id: recording_id.into(),
            task,
            status: JobStatus::Pending,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_succeeded(&mut self) {
        self.status = JobStatus::Success;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failure;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

/// Outcome of an asynchronous submission
#[derive(Debug)]
pub enum Submission {
    /// A report already exists, nothing was scheduled
    Cached(ClassificationReport),
    /// A job was registered and is running in the background
    Queued {
        job_id: Uuid,
        handle: JoinHandle<crate::error::Result<ClassificationReport>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&JobStatus::Success).unwrap(), "\"SUCCESS\"");
        assert_eq!(JobStatus::Pending.to_string(), "PENDING");
        assert!(JobStatus::Failure.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_lifecycle_timestamps() {
        let mut job = ClassificationJob::new("rec-1", TaskType::Abnormal);
        assert_eq!(job.status, JobStatus::Pending);

        job.mark_started();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.mark_failed("boom");
        assert_eq!(job.status, JobStatus::Failure);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.completed_at >= job.started_at);
    }
}
