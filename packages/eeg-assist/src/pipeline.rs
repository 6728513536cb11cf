use crate::aggregator::ResultAggregator;
use crate::classifier::{ProbabilityEstimate, UncertaintyAwareClassifier};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::model::{JsonModelLoader, ModelRegistry};
use crate::profile_scope;
use crate::recording::Recording;
use crate::segmentation::{SegmentationEngine, SegmentedRecording};
use crate::types::{ClassificationReport, TaskType};
use ndarray::Array4;
use std::sync::Arc;

/// Recording -> segmentation -> features -> ensemble -> report
pub struct ClassificationPipeline {
    config: Arc<PipelineConfig>,
    registry: Arc<ModelRegistry>,
    classifier: UncertaintyAwareClassifier,
    segmentation: SegmentationEngine,
    aggregator: ResultAggregator,
}

impl ClassificationPipeline {
    pub fn new(config: Arc<PipelineConfig>, registry: Arc<ModelRegistry>) -> Self {
        let classifier =
            UncertaintyAwareClassifier::new(Arc::clone(&registry), config.classifier.clone());
        Self {
            config,
            registry,
            classifier,
            segmentation: SegmentationEngine::new(),
            aggregator: ResultAggregator::new(),
        }
    }

    /// Pipeline reading models from `config.model_dir`
    pub fn from_config(config: PipelineConfig) -> Self {
        let loader = JsonModelLoader::new(config.model_dir.clone());
        let registry = Arc::new(ModelRegistry::new(Arc::new(loader)));
        Self::new(Arc::new(config), registry)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Ingest checks: global channel exclusion and maximum duration
    pub fn prepare(&self, recording: &mut Recording) -> Result<()> {
        if let Some(limit) = self.config.max_duration_minutes {
            recording.check_max_duration(limit)?;
        }
        recording.exclude_channels(&self.config.exclude_channels);
        Ok(())
    }

    pub fn segment(&self, recording: &mut Recording, task: TaskType) -> Result<SegmentedRecording> {
        let profile = self.config.profile(task)?;
        self.segmentation.segment(recording, &profile)
    }

    pub fn features(&self, segmented: &SegmentedRecording) -> Result<Array4<f64>> {
        FeatureExtractor::new(self.config.features.clone(), segmented.sfreq)
            .extract(segmented.frames.view())
    }

    pub fn estimate(&self, task: TaskType, features: &Array4<f64>) -> Result<ProbabilityEstimate> {
        self.classifier.predict(task, features.view())
    }

    /// Classify a whole recording for one task.
    ///
    /// Fails atomically: any stage error aborts the run and no report is built.
    pub fn run(&self, mut recording: Recording, task: TaskType) -> Result<ClassificationReport> {
        profile_scope!(format!("{} classification", task));
        log::info!(
            "🔬 Classifying {} recording: {} channels, {:.1}s at {} Hz",
            task,
            recording.n_channels(),
            recording.duration(),
            recording.sampling_frequency()
        );

        self.prepare(&mut recording)?;
        let segmented = self.segment(&mut recording, task)?;
        let features = self.features(&segmented)?;
        let estimate = self.estimate(task, &features)?;
        let report = self.aggregator.report(
            task,
            &estimate,
            &segmented.segment_cuts,
            segmented.sfreq,
        )?;

        log::info!(
            "✅ {} classification finished: {} segments",
            task,
            report.segments.len()
        );
        Ok(report)
    }
}
