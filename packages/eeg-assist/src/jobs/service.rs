use super::store::ReportStore;
use super::types::{ClassificationJob, JobStatus, Submission};
use crate::error::{EegError, Result};
use crate::pipeline::ClassificationPipeline;
use crate::recording::Recording;
use crate::types::{ClassificationReport, TaskType};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

type JobKey = (String, TaskType);

/// Runs classification jobs and serves their reports.
///
/// At most one successful computation happens per (recording, task): requests
/// for the same key are serialized and a stored report is returned as is.
pub struct ClassificationService {
    pipeline: Arc<ClassificationPipeline>,
    store: Arc<dyn ReportStore>,
    jobs: RwLock<HashMap<Uuid, ClassificationJob>>,
    guards: Mutex<HashMap<JobKey, Arc<Mutex<()>>>>,
}

impl ClassificationService {
    pub fn new(pipeline: Arc<ClassificationPipeline>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            pipeline,
            store,
            jobs: RwLock::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &ClassificationPipeline {
        &self.pipeline
    }

    /// Run `f` holding the (recording, task) lock.
    ///
    /// The lock entry is dropped again once no other caller holds or awaits it.
    fn with_key_locked<R>(&self, recording_id: &str, task: TaskType, f: impl FnOnce() -> R) -> R {
        let key: JobKey = (recording_id.to_string(), task);
        let guard = Arc::clone(self.guards.lock().entry(key.clone()).or_default());

        let result = {
            let _lock = guard.lock();
            f()
        };

        let mut guards = self.guards.lock();
        drop(guard);
        if guards
            .get(&key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            guards.remove(&key);
        }
        result
    }

    fn register(&self, recording_id: &str, task: TaskType) -> Uuid {
        let job = ClassificationJob::new(recording_id, task);
        let id = job.id;
        self.jobs.write().insert(id, job);
        log::debug!("📋 Job {} registered: {} / {}", id, recording_id, task);
        id
    }

    fn update<F: FnOnce(&mut ClassificationJob)>(&self, job_id: Uuid, f: F) {
        if let Some(job) = self.jobs.write().get_mut(&job_id) {
            f(job);
        }
    }

    /// Run the pipeline for a registered job. Caller holds the key guard.
    fn execute(
        &self,
        job_id: Uuid,
        recording_id: &str,
        recording: Recording,
        task: TaskType,
    ) -> Result<ClassificationReport> {
        self.update(job_id, |job| job.mark_started());
        log::info!("📋 Job {} running", job_id);

        let outcome = self
            .pipeline
            .run(recording, task)
            .and_then(|report| self.store.put(recording_id, &report).map(|_| report));

        match outcome {
            Ok(report) => {
                self.update(job_id, |job| job.mark_succeeded());
                log::info!("📋 Job {} completed successfully", job_id);
                Ok(report)
            }
            Err(e) => {
                log::error!("📋 Job {} failed: {}", job_id, e);
                self.update(job_id, |job| job.mark_failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Serialize on the key, reuse a stored report or compute a new one
    fn run_job(
        &self,
        job_id: Uuid,
        recording_id: &str,
        recording: Recording,
        task: TaskType,
    ) -> Result<ClassificationReport> {
        self.with_key_locked(recording_id, task, || match self.store.get(recording_id, task) {
            Ok(Some(report)) => {
                log::info!(
                    "📋 Job {}: {} report for {} already stored",
                    job_id,
                    task,
                    recording_id
                );
                self.update(job_id, |job| {
                    job.mark_started();
                    job.mark_succeeded();
                });
                Ok(report)
            }
            Ok(None) => self.execute(job_id, recording_id, recording, task),
            Err(e) => {
                self.update(job_id, |job| job.mark_failed(e.to_string()));
                Err(e)
            }
        })
    }

    /// Idempotent classification: a stored report is returned without recomputing
    pub fn classify(
        &self,
        recording_id: &str,
        recording: Recording,
        task: TaskType,
    ) -> Result<ClassificationReport> {
        if let Some(report) = self.store.get(recording_id, task)? {
            log::info!("Returning stored {} report for {}", task, recording_id);
            return Ok(report);
        }
        let job_id = self.register(recording_id, task);
        self.run_job(job_id, recording_id, recording, task)
    }

    /// Recompute and supersede any stored report
    pub fn reclassify(
        &self,
        recording_id: &str,
        recording: Recording,
        task: TaskType,
    ) -> Result<ClassificationReport> {
        self.with_key_locked(recording_id, task, || {
            if self.store.remove(recording_id, task)? {
                log::info!("Superseding stored {} report for {}", task, recording_id);
            }
            let job_id = self.register(recording_id, task);
            self.execute(job_id, recording_id, recording, task)
        })
    }

    /// Schedule classification on the blocking thread pool
    pub async fn submit(
        self: &Arc<Self>,
        recording_id: impl Into<String>,
        recording: Recording,
        task: TaskType,
    ) -> Result<Submission> {
        let recording_id = recording_id.into();
        if let Some(report) = self.store.get(&recording_id, task)? {
            return Ok(Submission::Cached(report));
        }

        let job_id = self.register(&recording_id, task);
        let service = Arc::clone(self);
        let handle = tokio::task::spawn_blocking(move || {
            service.run_job(job_id, &recording_id, recording, task)
        });

        Ok(Submission::Queued { job_id, handle })
    }

    /// Stored report filtered to `prob >= min_probability` (and `std <= max_std`)
    pub fn report(
        &self,
        recording_id: &str,
        task: TaskType,
        min_probability: f64,
        max_std: Option<f64>,
    ) -> Result<ClassificationReport> {
        let report =
            self.store
                .get(recording_id, task)?
                .ok_or_else(|| EegError::ReportNotFound {
                    recording_id: recording_id.to_string(),
                    task,
                })?;
        Ok(report.filtered(min_probability, max_std))
    }

    pub fn delete_report(&self, recording_id: &str, task: TaskType) -> Result<()> {
        self.with_key_locked(recording_id, task, || {
            if self.store.remove(recording_id, task)? {
                log::info!("Deleted {} report for {}", task, recording_id);
                Ok(())
            } else {
                Err(EegError::ReportNotFound {
                    recording_id: recording_id.to_string(),
                    task,
                })
            }
        })
    }

    pub fn job(&self, job_id: Uuid) -> Option<ClassificationJob> {
        self.jobs.read().get(&job_id).cloned()
    }

    /// All jobs, oldest first
    pub fn jobs(&self) -> Vec<ClassificationJob> {
        let mut jobs: Vec<ClassificationJob> = self.jobs.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    pub fn jobs_with_status(&self, status: JobStatus) -> Vec<ClassificationJob> {
        self.jobs()
            .into_iter()
            .filter(|job| job.status == status)
            .collect()
    }

    /// Drop succeeded and failed jobs from the job table, returning how many were removed.
    ///
    /// Stored reports are untouched. Long-running hosts call this periodically.
    pub fn remove_finished_jobs(&self) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| !job.status.is_terminal());
        let removed = before - jobs.len();
        if removed > 0 {
            log::debug!("Removed {} finished jobs", removed);
        }
        removed
    }
}
