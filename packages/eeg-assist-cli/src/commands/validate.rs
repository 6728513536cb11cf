use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use crate::session;
use eeg_assist::{ClassificationPipeline, EegError, PipelineConfig, TaskType};
use serde::Serialize;

#[derive(Serialize)]
struct ProfileSummary {
    task: TaskType,
    channels: usize,
}

#[derive(Serialize)]
struct ConfigSummary {
    segment_len_seconds: u32,
    frames_per_segment: u32,
    frame_len_seconds: u32,
    monte_carlo_passes: usize,
    batch_size: usize,
    bands: Vec<String>,
    model_dir: String,
    profiles: Vec<ProfileSummary>,
}

#[derive(Serialize)]
struct RecordingCheck {
    file: String,
    task: TaskType,
    channels: usize,
    n_times: usize,
    sfreq: f64,
    duration_seconds: f64,
    missing_channels: Vec<String>,
    segments: usize,
    feature_shape: Vec<usize>,
}

#[derive(Serialize)]
struct ValidateOutput {
    config: Option<ConfigSummary>,
    recording: Option<RecordingCheck>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let (result, code) = match session::load_config(&args.pipeline) {
        Ok(config) => {
            let summary = summarize(&config);
            match check_recording(&args, config) {
                Ok(recording) => (
                    ValidateOutput {
                        config: Some(summary),
                        recording,
                        error: None,
                    },
                    exit_codes::SUCCESS,
                ),
                Err((code, msg)) => (
                    ValidateOutput {
                        config: Some(summary),
                        recording: None,
                        error: Some(msg),
                    },
                    code,
                ),
            }
        }
        Err(e) => (
            ValidateOutput {
                config: None,
                recording: None,
                error: Some(e.to_string()),
            },
            session::exit_code_for(&e),
        ),
    };

    if args.json {
        if let Err(e) = output::emit(&result, false, None) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else if let Some(ref err) = result.error {
        eprintln!("Error: {}", err);
    } else {
        print_summary(&result);
    }

    code
}

fn summarize(config: &PipelineConfig) -> ConfigSummary {
    ConfigSummary {
        segment_len_seconds: config.segment_len_seconds,
        frames_per_segment: config.frames_per_segment,
        frame_len_seconds: config.segment_len_seconds / config.frames_per_segment.max(1),
        monte_carlo_passes: config.classifier.monte_carlo_passes,
        batch_size: config.classifier.batch_size,
        bands: config.features.bands.iter().map(|b| b.to_string()).collect(),
        model_dir: config.model_dir.display().to_string(),
        profiles: config
            .common_channels
            .iter()
            .map(|(&task, channels)| ProfileSummary {
                task,
                channels: channels.len(),
            })
            .collect(),
    }
}

/// Runs ingest, segmentation and feature extraction; no model is needed
fn check_recording(
    args: &ValidateArgs,
    config: PipelineConfig,
) -> Result<Option<RecordingCheck>, (i32, String)> {
    let (file, sr, task) = match (&args.file, args.sr, args.task) {
        (Some(file), Some(sr), Some(task)) => (file, sr, task),
        _ => return Ok(None),
    };
    session::validate_file(file).map_err(|msg| (exit_codes::INPUT_ERROR, msg))?;

    let failed = |e: EegError| (session::exit_code_for(&e), e.to_string());
    let pipeline = ClassificationPipeline::from_config(config);
    let profile = pipeline.config().profile(task).map_err(failed)?;

    let mut recording = session::read_recording(file, sr, None).map_err(failed)?;
    let (channels, n_times, duration) = (
        recording.n_channels(),
        recording.n_times(),
        recording.duration(),
    );
    pipeline.prepare(&mut recording).map_err(failed)?;

    let missing_channels: Vec<String> = profile
        .common_channels
        .iter()
        .filter(|name| !recording.channel_names().contains(name))
        .cloned()
        .collect();

    let segmented = pipeline.segment(&mut recording, task).map_err(failed)?;
    let features = pipeline.features(&segmented).map_err(failed)?;

    Ok(Some(RecordingCheck {
        file: file.clone(),
        task,
        channels,
        n_times,
        sfreq: sr,
        duration_seconds: duration,
        missing_channels,
        segments: segmented.segment_cuts.len(),
        feature_shape: features.shape().to_vec(),
    }))
}

fn print_summary(result: &ValidateOutput) {
    if let Some(ref config) = result.config {
        println!(
            "Configuration is valid: {}s segments, {} frames of {}s",
            config.segment_len_seconds, config.frames_per_segment, config.frame_len_seconds
        );
        println!(
            "Ensemble: {} passes, batch size {}",
            config.monte_carlo_passes, config.batch_size
        );
        println!("Bands: {}", config.bands.join(", "));
        for profile in &config.profiles {
            println!("  {}: {} channels", profile.task, profile.channels);
        }
    }
    if let Some(ref rec) = result.recording {
        println!(
            "Recording '{}' is valid for {}: {} channels, {:.1}s, {} segments, features {:?}",
            rec.file, rec.task, rec.channels, rec.duration_seconds, rec.segments, rec.feature_shape
        );
        if !rec.missing_channels.is_empty() {
            println!("Missing channels: {}", rec.missing_channels.join(", "));
        }
    }
}
