use clap::{Args, Parser, Subcommand};
use eeg_assist::TaskType;

#[derive(Parser)]
#[command(
    name = "eeg-assist",
    version,
    about = "Uncertainty-aware EEG classification",
    long_about = "Segment EEG recordings (CSV/ASCII), extract per-frame features and classify\n\
                  each segment with a Monte Carlo dropout ensemble.\n\
                  Models are read from <model_dir>/<task>.json. Set $EEG_ASSIST_MODEL_DIR or use --models."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify a single recording
    Classify(ClassifyArgs),
    /// Classify many recordings with shared settings
    Batch(BatchArgs),
    /// Filter a saved classification report
    Report(ReportArgs),
    /// Validate configuration and, optionally, a recording
    Validate(ValidateArgs),
    /// Show version, tasks, bands and model availability
    Info(InfoArgs),
}

/// Options shared by every command that builds a pipeline
#[derive(Args, Clone, Default)]
pub struct PipelineArgs {
    /// Pipeline configuration file (JSON). Defaults plus $EEG_ASSIST_* overrides otherwise
    #[arg(long)]
    pub config: Option<String>,

    /// Directory containing <task>.json model files
    #[arg(long)]
    pub models: Option<String>,

    /// Number of Monte Carlo passes
    #[arg(long)]
    pub passes: Option<usize>,

    /// Inference batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seed for reproducible dropout masks
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// Input recording (CSV, TXT/ASCII)
    #[arg(long)]
    pub file: String,

    /// Sampling rate in Hz
    #[arg(long)]
    pub sr: f64,

    /// Classification task (abnormal, seizure, artifact)
    #[arg(long)]
    pub task: TaskType,

    /// Resample to this rate (Hz) before segmentation
    #[arg(long)]
    pub resample: Option<f64>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Keep only segments with prob >= this value
    #[arg(long, value_parser = parse_probability)]
    pub min_prob: Option<f64>,

    /// Keep only segments with std <= this value
    #[arg(long)]
    pub max_std: Option<f64>,

    /// Add a binary label per segment
    #[arg(long, default_value_t = false)]
    pub labels: bool,

    /// Probability threshold for --labels (label = prob > threshold)
    #[arg(long, default_value_t = 0.5, value_parser = parse_probability)]
    pub label_threshold: f64,

    /// Uncertainty threshold for --labels (label also requires std < value)
    #[arg(long)]
    pub label_max_std: Option<f64>,

    /// Report store directory; stored reports are reused
    #[arg(long)]
    pub store: Option<String>,

    /// Recompute even when the store holds a report
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files (e.g. "data/*.csv")
    #[arg(long, conflicts_with = "files")]
    pub glob: Option<String>,

    /// Explicit list of input files
    #[arg(long, num_args = 1..)]
    pub files: Option<Vec<String>>,

    /// Sampling rate in Hz (shared by all files)
    #[arg(long)]
    pub sr: f64,

    /// Classification task (abnormal, seizure, artifact)
    #[arg(long)]
    pub task: TaskType,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Report store directory; stored reports are reused
    #[arg(long)]
    pub store: Option<String>,

    /// Write one <stem>_<task>.json per file instead of JSONL on stdout
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Keep going after a failed file
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Classify files concurrently
    #[arg(long, default_value_t = false)]
    pub parallel: bool,

    /// List matching files and exit
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Report JSON written by classify or batch
    #[arg(long)]
    pub input: String,

    /// Keep only segments with prob >= this value
    #[arg(long, value_parser = parse_probability)]
    pub min_prob: f64,

    /// Keep only segments with std <= this value
    #[arg(long)]
    pub max_std: Option<f64>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Recording to check against the task profile
    #[arg(long, requires_all = ["sr", "task"])]
    pub file: Option<String>,

    /// Sampling rate in Hz of --file
    #[arg(long)]
    pub sr: Option<f64>,

    /// Task profile to check --file against
    #[arg(long)]
    pub task: Option<TaskType>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Parse a probability in [0, 1].
pub fn parse_probability(s: &str) -> Result<f64, String> {
    let value = s
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("Probability {} is outside [0, 1]", value));
    }
    Ok(value)
}
