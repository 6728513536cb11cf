use crate::cli::PipelineArgs;
use crate::exit_codes;
use eeg_assist::{
    label_segments, ClassificationPipeline, ClassificationReport, ClassificationService, EegError,
    JsonReportStore, PipelineConfig, Recording, RecordingSource, TaskType, TextRecordingReader,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "txt", "ascii", "asc"];

/// Configuration precedence: file (or defaults) < $EEG_ASSIST_* < command-line flags.
pub fn load_config(args: &PipelineArgs) -> Result<PipelineConfig, EegError> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = PipelineConfig::from_file(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => PipelineConfig::from_env()?,
    };

    if let Some(dir) = &args.models {
        config.model_dir = PathBuf::from(dir);
    }
    if let Some(passes) = args.passes {
        config.classifier.monte_carlo_passes = passes;
    }
    if let Some(batch_size) = args.batch_size {
        config.classifier.batch_size = batch_size;
    }
    if let Some(seed) = args.seed {
        config.classifier.seed = Some(seed);
    }
    config.validate()?;
    Ok(config)
}

/// Existence and supported extension.
pub fn validate_file(file_path: &str) -> Result<(), String> {
    let path = Path::new(file_path);
    if !path.is_file() {
        return Err(format!("Input file not found: {}", file_path));
    }
    if !is_supported_extension(path) {
        return Err(format!(
            "Unsupported file extension '{}'. Supported: {}",
            path.extension().and_then(|e| e.to_str()).unwrap_or(""),
            SUPPORTED_EXTENSIONS.join(", ")
        ));
    }
    Ok(())
}

pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

pub fn read_recording(file_path: &str, sr: f64, resample: Option<f64>) -> Result<Recording, EegError> {
    let mut recording = TextRecordingReader::new(file_path, sr).read_recording()?;
    if let Some(target) = resample {
        recording.resample(target)?;
    }
    Ok(recording)
}

/// Report store key for a file: its stem
pub fn recording_id(file_path: &str) -> String {
    Path::new(file_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording")
        .to_string()
}

pub fn exit_code_for(err: &EegError) -> i32 {
    match err {
        EegError::ModelLoad { .. } => exit_codes::MODEL_NOT_FOUND,
        EegError::InvalidConfig(_)
        | EegError::ChannelDecode(_)
        | EegError::TooShortRecording { .. }
        | EegError::DegenerateNormalization { .. }
        | EegError::DurationExceeded { .. }
        | EegError::ReportNotFound { .. }
        | EegError::InvalidRecordingId(_) => exit_codes::INPUT_ERROR,
        _ => exit_codes::EXECUTION_ERROR,
    }
}

/// Pipeline, optionally backed by an on-disk report store
pub struct Session {
    pipeline: Arc<ClassificationPipeline>,
    service: Option<ClassificationService>,
    force: bool,
}

impl Session {
    pub fn new(config: PipelineConfig, store_dir: Option<&str>, force: bool) -> Self {
        let pipeline = Arc::new(ClassificationPipeline::from_config(config));
        let service = store_dir.map(|dir| {
            ClassificationService::new(
                Arc::clone(&pipeline),
                Arc::new(JsonReportStore::new(dir)),
            )
        });
        Self {
            pipeline,
            service,
            force,
        }
    }

    pub fn classify(
        &self,
        file_path: &str,
        recording: Recording,
        task: TaskType,
    ) -> Result<ClassificationReport, EegError> {
        match &self.service {
            Some(service) if self.force => {
                service.reclassify(&recording_id(file_path), recording, task)
            }
            Some(service) => service.classify(&recording_id(file_path), recording, task),
            None => self.pipeline.run(recording, task),
        }
    }
}

/// JSON document written by classify and batch; `report` reads it back
#[derive(Serialize)]
pub struct ClassifyOutput {
    pub file: String,
    #[serde(flatten)]
    pub report: ClassificationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<bool>>,
}

impl ClassifyOutput {
    pub fn new(file: &str, report: ClassificationReport) -> Self {
        Self {
            file: file.to_string(),
            report,
            labels: None,
        }
    }

    pub fn with_labels(mut self, prob_threshold: f64, std_threshold: Option<f64>) -> Self {
        self.labels = Some(label_segments(
            &self.report.segments,
            prob_threshold,
            std_threshold,
        ));
        self
    }
}
