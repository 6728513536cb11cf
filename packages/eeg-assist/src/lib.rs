pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod dsp;
pub mod error;
pub mod features;
pub mod jobs;
pub mod model;
pub mod pipeline;
pub mod profiling;
pub mod recording;
pub mod segmentation;
pub mod source;
pub mod types;

pub use aggregator::{filter_segments, label_segments, ResultAggregator};
pub use classifier::{ProbabilityEstimate, UncertaintyAwareClassifier};
pub use config::{ClassifierConfig, FeatureConfig, PipelineConfig, SegmentationProfile};
pub use error::{EegError, Result};
pub use features::FeatureExtractor;
pub use jobs::{
    ClassificationJob, ClassificationService, InMemoryReportStore, JobStatus, JsonReportStore,
    ReportStore, Submission,
};
pub use model::{DropoutMlp, JsonModelLoader, ModelLoader, ModelRegistry, StochasticModel};
pub use pipeline::ClassificationPipeline;
pub use recording::Recording;
pub use segmentation::{SegmentationEngine, SegmentedRecording};
pub use source::{RecordingSource, TextRecordingReader};
pub use types::*;
