use crate::error::{EegError, Result};
use crate::types::{ClassificationReport, TaskType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage collaborator for finished reports, keyed by (recording, task)
pub trait ReportStore: Send + Sync {
    fn get(&self, recording_id: &str, task: TaskType) -> Result<Option<ClassificationReport>>;

    /// Store a report, superseding any previous one for the same key
    fn put(&self, recording_id: &str, report: &ClassificationReport) -> Result<()>;

    /// Returns whether a report was removed
    fn remove(&self, recording_id: &str, task: TaskType) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<(String, TaskType), ClassificationReport>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

impl ReportStore for InMemoryReportStore {
    fn get(&self, recording_id: &str, task: TaskType) -> Result<Option<ClassificationReport>> {
        Ok(self
            .reports
            .read()
            .get(&(recording_id.to_string(), task))
            .cloned())
    }

    fn put(&self, recording_id: &str, report: &ClassificationReport) -> Result<()> {
        self.reports
            .write()
            .insert((recording_id.to_string(), report.task), report.clone());
        Ok(())
    }

    fn remove(&self, recording_id: &str, task: TaskType) -> Result<bool> {
        Ok(self
            .reports
            .write()
            .remove(&(recording_id.to_string(), task))
            .is_some())
    }
}

/// One JSON file per report: `<root>/<recording_id>/<task>.json`
#[derive(Debug, Clone)]
pub struct JsonReportStore {
    root: PathBuf,
}

impl JsonReportStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Report file for a key; ids that would leave `root` are rejected
    pub fn path(&self, recording_id: &str, task: TaskType) -> Result<PathBuf> {
        validate_recording_id(recording_id)?;
        Ok(self.root.join(recording_id).join(format!("{}.json", task)))
    }
}

fn validate_recording_id(recording_id: &str) -> Result<()> {
    let invalid = recording_id.is_empty()
        || recording_id == "."
        || recording_id == ".."
        || recording_id.contains(['/', '\\', ':', '\0']);
    if invalid {
        return Err(EegError::InvalidRecordingId(recording_id.to_string()));
    }
    Ok(())
}

impl ReportStore for JsonReportStore {
    fn get(&self, recording_id: &str, task: TaskType) -> Result<Option<ClassificationReport>> {
        let path = self.path(recording_id, task)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_report(&path)?))
    }

    fn put(&self, recording_id: &str, report: &ClassificationReport) -> Result<()> {
        let path = self.path(recording_id, report.task)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        log::debug!("Stored report at {}", path.display());
        Ok(())
    }

    fn remove(&self, recording_id: &str, task: TaskType) -> Result<bool> {
        let path = self.path(recording_id, task)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}

/// Read a report written by `JsonReportStore` (or the CLI)
pub fn read_report(path: &Path) -> Result<ClassificationReport> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
