use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use crate::session;
use eeg_assist::{Band, TaskType};
use serde::Serialize;

#[derive(Serialize)]
struct BandInfo {
    name: &'static str,
    low_hz: f64,
    high_hz: f64,
}

#[derive(Serialize)]
struct ModelInfo {
    task: TaskType,
    path: String,
    present: bool,
}

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    platform: String,
    arch: String,
    tasks: Vec<TaskType>,
    bands: Vec<BandInfo>,
    default_bands: Vec<&'static str>,
    model_dir: String,
    models: Vec<ModelInfo>,
}

pub fn execute(args: InfoArgs) -> i32 {
    let config = match session::load_config(&args.pipeline) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return session::exit_code_for(&e);
        }
    };

    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        tasks: TaskType::ALL.to_vec(),
        bands: Band::TABLE
            .iter()
            .map(|band| {
                let (low_hz, high_hz) = band.range_hz();
                BandInfo {
                    name: band.name(),
                    low_hz,
                    high_hz,
                }
            })
            .collect(),
        default_bands: Band::DEFAULT.iter().map(|b| b.name()).collect(),
        model_dir: config.model_dir.display().to_string(),
        models: TaskType::ALL
            .iter()
            .map(|&task| {
                let path = config.model_path(task);
                ModelInfo {
                    task,
                    present: path.is_file(),
                    path: path.display().to_string(),
                }
            })
            .collect(),
    };

    if args.json {
        if let Err(e) = output::emit(&info, false, None) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("eeg-assist CLI v{}", info.cli_version);
        println!("Platform: {} ({})", info.platform, info.arch);
        println!();
        println!(
            "Tasks: {}",
            info.tasks
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        for band in &info.bands {
            println!("  {:<6} {:>5.1}-{:<5.1} Hz", band.name, band.low_hz, band.high_hz);
        }
        println!("Default bands: {}", info.default_bands.join(", "));
        println!();
        println!("Model directory: {}", info.model_dir);
        for model in &info.models {
            let status = if model.present { "found" } else { "missing" };
            println!("  {:<9} {} ({})", model.task.as_str(), model.path, status);
        }
    }

    exit_codes::SUCCESS
}
