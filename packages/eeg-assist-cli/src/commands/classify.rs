use crate::cli::ClassifyArgs;
use crate::exit_codes;
use crate::output;
use crate::session::{self, ClassifyOutput, Session};
use std::time::Instant;

pub async fn execute(args: ClassifyArgs) -> i32 {
    if let Err(msg) = session::validate_file(&args.file) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
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
    let passes = config.classifier.monte_carlo_passes;
    let runner = Session::new(config, args.store.as_deref(), args.force);

    if !args.quiet {
        eprintln!(
            "Classifying {} for {} ({} Monte Carlo passes)...",
            args.file, args.task, passes
        );
    }
    let start_time = Instant::now();

    let file = args.file.clone();
    let (task, sr, resample) = (args.task, args.sr, args.resample);
    let result = tokio::task::spawn_blocking(move || {
        let recording = session::read_recording(&file, sr, resample)?;
        runner.classify(&file, recording, task)
    })
    .await;

    let report = match result {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            return session::exit_code_for(&e);
        }
        Err(e) => {
            eprintln!("Error: Classification task failed: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    if !args.quiet {
        eprintln!(
            "Classified {} segments in {:.1}s",
            report.segments.len(),
            start_time.elapsed().as_secs_f64()
        );
    }

    let report = match (args.min_prob, args.max_std) {
        (None, None) => report,
        (min_prob, max_std) => report.filtered(min_prob.unwrap_or(0.0), max_std),
    };

    let mut result = ClassifyOutput::new(&args.file, report);
    if args.labels {
        result = result.with_labels(args.label_threshold, args.label_max_std);
    }

    if let Err(e) = output::emit(&result, args.compact, args.output.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    if !args.quiet {
        if let Some(ref path) = args.output {
            eprintln!("Results written to {}", path);
        }
    }

    exit_codes::SUCCESS
}
