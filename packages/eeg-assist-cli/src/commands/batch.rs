use crate::cli::BatchArgs;
use crate::exit_codes;
use crate::output;
use crate::session::{self, ClassifyOutput, Session};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

pub fn execute(args: BatchArgs) -> i32 {
    let files = match resolve_files(&args) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if files.is_empty() {
        eprintln!("Error: No matching files found");
        return exit_codes::INPUT_ERROR;
    }

    if args.dry_run {
        for f in &files {
            println!("{}", f);
        }
        if !args.quiet {
            eprintln!("Found {} file(s)", files.len());
        }
        return exit_codes::SUCCESS;
    }

    if !(args.sr.is_finite() && args.sr > 0.0) {
        eprintln!("Error: Sampling rate must be positive, got {}", args.sr);
        return exit_codes::INPUT_ERROR;
    }

    let config = match session::load_config(&args.pipeline) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return session::exit_code_for(&e);
        }
    };

    if let Some(ref dir) = args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Error: Failed to create output directory '{}': {}", dir, e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    // One session so the model is loaded once for all files
    let runner = Session::new(config, args.store.as_deref(), false);

    let total = files.len();
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let start_time = Instant::now();

    if args.parallel {
        // Every file is attempted; outputs keep input order
        let results: Vec<Result<ClassifyOutput, String>> = files
            .par_iter()
            .map(|file_path| classify_file(&runner, file_path, &args))
            .collect();

        for (file_path, result) in files.iter().zip(results) {
            match result.and_then(|out| write_result(&out, &args)) {
                Ok(()) => succeeded += 1,
                Err(msg) => {
                    eprintln!("  {}: {}", file_path, msg);
                    failed += 1;
                }
            }
        }
    } else {
        for (i, file_path) in files.iter().enumerate() {
            if !args.quiet {
                eprintln!("[{}/{}] {}...", i + 1, total, file_path);
            }

            match classify_file(&runner, file_path, &args).and_then(|out| write_result(&out, &args))
            {
                Ok(()) => succeeded += 1,
                Err(msg) => {
                    eprintln!("  Error: {}", msg);
                    failed += 1;
                    if !args.continue_on_error {
                        break;
                    }
                }
            }
        }
    }

    let elapsed = start_time.elapsed();

    if !args.quiet {
        eprintln!(
            "Batch complete: {}/{} succeeded, {}/{} failed, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            elapsed.as_secs_f64()
        );
    }

    if failed == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

fn classify_file(runner: &Session, file_path: &str, args: &BatchArgs) -> Result<ClassifyOutput, String> {
    session::validate_file(file_path)?;
    let recording =
        session::read_recording(file_path, args.sr, None).map_err(|e| e.to_string())?;
    let report = runner
        .classify(file_path, recording, args.task)
        .map_err(|e| e.to_string())?;
    Ok(ClassifyOutput::new(file_path, report))
}

/// `<output_dir>/<stem>_<task>.json`, or one JSONL line on stdout
fn write_result(result: &ClassifyOutput, args: &BatchArgs) -> Result<(), String> {
    match args.output_dir {
        Some(ref dir) => {
            let out_path = output_path(dir, &result.file, &args.task.to_string());
            output::emit(result, args.compact, out_path.to_str())
        }
        None => output::emit(result, true, None),
    }
}

fn output_path(dir: &str, file_path: &str, task: &str) -> std::path::PathBuf {
    Path::new(dir).join(format!("{}_{}.json", session::recording_id(file_path), task))
}

fn resolve_files(args: &BatchArgs) -> Result<Vec<String>, String> {
    if let Some(ref pattern) = args.glob {
        resolve_glob(pattern)
    } else if let Some(ref files) = args.files {
        Ok(files.clone())
    } else {
        Err("One of --glob or --files must be specified".to_string())
    }
}

fn resolve_glob(pattern: &str) -> Result<Vec<String>, String> {
    let paths =
        glob::glob(pattern).map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))?;

    let mut files: Vec<String> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() && session::is_supported_extension(&path) {
                    if let Some(s) = path.to_str() {
                        files.push(s.to_string());
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: glob error: {}", e);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::PipelineArgs;
    use eeg_assist::TaskType;
    use std::fs;

    fn make_batch_args() -> BatchArgs {
        BatchArgs {
            glob: None,
            files: None,
            sr: 256.0,
            task: TaskType::Abnormal,
            pipeline: PipelineArgs::default(),
            store: None,
            output_dir: None,
            continue_on_error: false,
            parallel: false,
            dry_run: false,
            compact: false,
            quiet: false,
        }
    }

    #[test]
    fn test_resolve_files_no_input() {
        let args = make_batch_args();
        let result = resolve_files(&args);
        assert!(result.unwrap_err().contains("must be specified"));
    }

    #[test]
    fn test_resolve_files_explicit_list() {
        let mut args = make_batch_args();
        args.files = Some(vec!["/tmp/a.csv".to_string(), "/tmp/b.txt".to_string()]);
        let result = resolve_files(&args).unwrap();
        assert_eq!(result, vec!["/tmp/a.csv", "/tmp/b.txt"]);
    }

    #[test]
    fn test_resolve_glob_no_matches() {
        let result = resolve_glob("/nonexistent_dir_12345/*.csv").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_resolve_glob_filters_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.csv"), "").unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("c.edf"), "").unwrap();

        let pattern = format!("{}/*", tmp.path().to_str().unwrap());
        let result = resolve_glob(&pattern).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].ends_with("a.txt"));
        assert!(result[1].ends_with("b.csv"));
    }

    #[test]
    fn test_output_path_uses_stem_and_task() {
        let path = output_path("/out", "/data/sub-01.csv", "seizure");
        assert_eq!(path, Path::new("/out/sub-01_seizure.json"));
    }
}
