use eeg_assist::model::DenseLayer;
use eeg_assist::{
    ClassificationPipeline, ClassificationService, DropoutMlp, EegError, JobStatus,
    JsonReportStore, PipelineConfig, RecordingSource, Submission, TaskType, TextRecordingReader,
};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SFREQ: f64 = 10.0;
const CHANNELS: [&str; 4] = ["Fp1", "Fp2", "C3", "C4"];
// 8 frames x 4 channels x (7 scalar + 4 bands + 4 correlations)
const INPUT_SHAPE: (usize, usize, usize) = (8, 4, 15);

fn write_csv(dir: &Path, seconds: usize) -> PathBuf {
    let mut content = String::from("Fp1,Fp2,C3,C4,ECG\n");
    for t in 0..seconds * SFREQ as usize {
        let row: Vec<String> = (0..5)
            .map(|c| format!("{:.6}", (t as f64 * 0.7 + c as f64 * 1.3).sin() * 50.0 + c as f64))
            .collect();
        content.push_str(&row.join(","));
        content.push('\n');
    }
    let path = dir.join("recording.csv");
    fs::write(&path, content).unwrap();
    path
}

fn write_model(model_dir: &Path, dropout: f64) {
    fs::create_dir_all(model_dir).unwrap();
    let (f, c, n) = INPUT_SHAPE;
    let inputs = f * c * n;
    let hidden = DenseLayer::new(
        Array2::from_shape_fn((6, inputs), |(i, j)| ((i * 31 + j * 7) % 11) as f64 * 0.01 - 0.05),
        Array1::from_elem(6, 0.1),
    );
    let output = DenseLayer::new(
        Array2::from_shape_fn((2, 6), |(i, j)| if i == 1 { 0.3 } else { -0.2 * j as f64 }),
        Array1::zeros(2),
    );
    DropoutMlp::new(TaskType::Seizure, INPUT_SHAPE, hidden, output, dropout)
        .unwrap()
        .save(model_dir.join("seizure.json"))
        .unwrap();
}

fn write_config(dir: &Path, seed: Option<u64>) -> PathBuf {
    let whitelist: Vec<String> = CHANNELS.iter().map(|s| s.to_string()).collect();
    let common_channels: BTreeMap<TaskType, Vec<String>> =
        TaskType::ALL.iter().map(|&t| (t, whitelist.clone())).collect();
    let mut config = PipelineConfig {
        common_channels,
        model_dir: dir.join("models"),
        ..Default::default()
    };
    config.classifier.monte_carlo_passes = 12;
    config.classifier.batch_size = 2;
    config.classifier.seed = seed;

    let path = dir.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn setup(seed: Option<u64>) -> (tempfile::TempDir, ClassificationPipeline, TextRecordingReader) {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(dir.path(), 50);
    write_model(&dir.path().join("models"), 0.4);
    let config = PipelineConfig::from_file(write_config(dir.path(), seed)).unwrap();
    let pipeline = ClassificationPipeline::from_config(config);
    (dir, pipeline, TextRecordingReader::new(csv, SFREQ))
}

#[test]
fn test_csv_recording_to_report() {
    let (_dir, pipeline, reader) = setup(Some(3));
    let recording = reader.read_recording().unwrap();
    assert_eq!(recording.n_channels(), 5);

    let report = pipeline.run(recording, TaskType::Seizure).unwrap();
    assert_eq!(report.task, TaskType::Seizure);
    assert_eq!(report.segments.len(), 3);

    for (i, seg) in report.segments.iter().enumerate() {
        assert_eq!(seg.nr, i);
        assert_eq!(seg.start_time, 16 * i as u64);
        assert_eq!(seg.stop_time, 16 * (i as u64 + 1));
        assert!((0.0..=1.0).contains(&seg.probability_mean));
        assert!(seg.probability_std >= 0.0);
    }
    assert!(pipeline.registry().is_loaded(TaskType::Seizure));
}

#[test]
fn test_seeded_pipelines_agree() {
    let (_dir_a, pipeline_a, reader_a) = setup(Some(42));
    let (_dir_b, pipeline_b, reader_b) = setup(Some(42));

    let a = pipeline_a
        .run(reader_a.read_recording().unwrap(), TaskType::Seizure)
        .unwrap();
    let b = pipeline_b
        .run(reader_b.read_recording().unwrap(), TaskType::Seizure)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_missing_model_for_task() {
    let (_dir, pipeline, reader) = setup(None);
    let err = pipeline
        .run(reader.read_recording().unwrap(), TaskType::Artifact)
        .unwrap_err();
    assert!(matches!(err, EegError::ModelLoad { task: TaskType::Artifact, .. }));
}

#[test]
fn test_service_persists_reports_on_disk() {
    let (dir, pipeline, reader) = setup(Some(1));
    let store = Arc::new(JsonReportStore::new(dir.path().join("reports")));
    let service = ClassificationService::new(Arc::new(pipeline), store.clone());

    let first = service
        .classify("rec-1", reader.read_recording().unwrap(), TaskType::Seizure)
        .unwrap();
    let second = service
        .classify("rec-1", reader.read_recording().unwrap(), TaskType::Seizure)
        .unwrap();
    assert_eq!(first, second);
    assert!(store.path("rec-1", TaskType::Seizure).unwrap().exists());

    let jobs = service.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Success);

    let everything = service.report("rec-1", TaskType::Seizure, 0.0, None).unwrap();
    assert_eq!(everything.segments.len(), 3);
    let nothing = service.report("rec-1", TaskType::Seizure, 1.1, None).unwrap();
    assert!(nothing.segments.is_empty());

    service.delete_report("rec-1", TaskType::Seizure).unwrap();
    assert!(matches!(
        service.report("rec-1", TaskType::Seizure, 0.0, None),
        Err(EegError::ReportNotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_runs_in_background() {
    let (dir, pipeline, reader) = setup(Some(9));
    let store = Arc::new(JsonReportStore::new(dir.path().join("reports")));
    let service = Arc::new(ClassificationService::new(Arc::new(pipeline), store));

    let submission = service
        .submit("rec-2", reader.read_recording().unwrap(), TaskType::Seizure)
        .await
        .unwrap();
    let report = match submission {
        Submission::Queued { job_id, handle } => {
            let report = handle.await.unwrap().unwrap();
            assert_eq!(service.job(job_id).unwrap().status, JobStatus::Success);
            report
        }
        Submission::Cached(_) => panic!("nothing stored yet"),
    };

    match service
        .submit("rec-2", reader.read_recording().unwrap(), TaskType::Seizure)
        .await
        .unwrap()
    {
        Submission::Cached(cached) => assert_eq!(cached, report),
        Submission::Queued { .. } => panic!("report should be cached"),
    }
}
