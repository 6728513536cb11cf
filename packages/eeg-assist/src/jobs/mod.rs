//! Classification job lifecycle and report storage

pub mod service;
pub mod store;
pub mod types;

pub use service::ClassificationService;
pub use store::{read_report, InMemoryReportStore, JsonReportStore, ReportStore};
pub use types::{ClassificationJob, JobStatus, Submission};
