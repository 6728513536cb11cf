use crate::cli::ReportArgs;
use crate::exit_codes;
use crate::output;
use eeg_assist::jobs::read_report;
use std::path::Path;

pub fn execute(args: ReportArgs) -> i32 {
    let path = Path::new(&args.input);
    if !path.is_file() {
        eprintln!("Error: Report file not found: {}", args.input);
        return exit_codes::INPUT_ERROR;
    }

    let report = match read_report(path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: Cannot read report '{}': {}", args.input, e);
            return exit_codes::INPUT_ERROR;
        }
    };
    if let Some(max_std) = args.max_std {
        if max_std.is_nan() || max_std < 0.0 {
            eprintln!("Error: --max-std must be non-negative, got {}", max_std);
            return exit_codes::INPUT_ERROR;
        }
    }

    let total = report.segments.len();
    let filtered = report.filtered(args.min_prob, args.max_std);
    log::info!("Kept {}/{} segments", filtered.segments.len(), total);

    if let Err(e) = output::emit(&filtered, args.compact, args.output.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    exit_codes::SUCCESS
}
