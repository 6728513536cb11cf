use crate::config::ClassifierConfig;
use crate::error::{EegError, Result};
use crate::model::{ModelRegistry, StochasticModel};
use crate::profile_scope;
use crate::types::TaskType;
use ndarray::{s, ArrayView4};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use std::sync::Arc;

/// Per-segment ensemble statistics of the positive-class probability
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityEstimate {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ProbabilityEstimate {
    /// Arithmetic mean and population standard deviation across passes.
    ///
    /// `samples[pass][segment]`; every pass must cover the same segments.
    pub fn from_passes(samples: &[Vec<f64>]) -> Result<Self> {
        let num_passes = samples.len();
        if num_passes == 0 {
            return Err(EegError::Inference("No Monte Carlo passes to reduce".to_string()));
        }
        let num_segments = samples[0].len();
        if samples.iter().any(|pass| pass.len() != num_segments) {
            return Err(EegError::ShapeMismatch(
                "Monte Carlo passes disagree on segment count".to_string(),
            ));
        }

        let n = num_passes as f64;
        let mean: Vec<f64> = (0..num_segments)
            .map(|seg| samples.iter().map(|pass| pass[seg]).sum::<f64>() / n)
            .collect();
        let std: Vec<f64> = (0..num_segments)
            .map(|seg| {
                let m = mean[seg];
                let var = samples
                    .iter()
                    .map(|pass| (pass[seg] - m).powi(2))
                    .sum::<f64>()
                    / n;
                var.sqrt()
            })
            .collect();

        Ok(Self { mean, std })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Monte Carlo dropout ensemble over a cached task model
pub struct UncertaintyAwareClassifier {
    registry: Arc<ModelRegistry>,
    config: ClassifierConfig,
}

impl UncertaintyAwareClassifier {
    pub fn new(registry: Arc<ModelRegistry>, config: ClassifierConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify every segment of a `(segments, frames, channels, features)` tensor.
    ///
    /// All passes must succeed; any failing pass fails the whole call.
    pub fn predict(
        &self,
        task: TaskType,
        features: ArrayView4<'_, f64>,
    ) -> Result<ProbabilityEstimate> {
        profile_scope!(format!("{} ensemble", task));

        let model = self.registry.get(task)?;
        let (num_segments, frames, channels, width) = features.dim();

        if (frames, channels, width) != model.input_shape() {
            return Err(EegError::Inference(format!(
                "{} model expects segments of shape {:?}, features have {:?}",
                task,
                model.input_shape(),
                (frames, channels, width)
            )));
        }
        if self.config.positive_class >= model.num_classes() {
            return Err(EegError::Inference(format!(
                "Positive class {} out of range for {} classes",
                self.config.positive_class,
                model.num_classes()
            )));
        }

        let passes = self.config.monte_carlo_passes;
        log::info!(
            "Running {} Monte Carlo passes over {} segments (batch size {}, {})",
            passes,
            num_segments,
            self.config.batch_size,
            if self.config.seed.is_some() { "seeded" } else { "unseeded" }
        );

        let run_pass = |pass: usize| -> Result<Vec<f64>> {
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(pass as u64)),
                None => StdRng::from_rng(&mut rand::rng()),
            };
            self.single_pass(model.as_ref(), features, &mut rng)
                .map_err(|e| EegError::Inference(format!("Pass {} failed: {}", pass, e)))
        };

        let samples: Vec<Vec<f64>> = if self.config.parallel_passes {
            (0..passes)
                .into_par_iter()
                .map(&run_pass)
                .collect::<Result<_>>()?
        } else {
            (0..passes).map(&run_pass).collect::<Result<_>>()?
        };

        let estimate = ProbabilityEstimate::from_passes(&samples)?;
        log::debug!(
            "Ensemble reduced: mean probability range [{:.4}, {:.4}]",
            estimate.mean.iter().copied().fold(f64::INFINITY, f64::min),
            estimate.mean.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        );
        Ok(estimate)
    }

    fn single_pass(
        &self,
        model: &dyn StochasticModel,
        features: ArrayView4<'_, f64>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>> {
        let num_segments = features.shape()[0];
        let batch_size = self.config.batch_size.max(1);
        let positive = self.config.positive_class;
        let mut out = Vec::with_capacity(num_segments);

        for start in (0..num_segments).step_by(batch_size) {
            let end = (start + batch_size).min(num_segments);
            let batch = features.slice(s![start..end, .., .., ..]);
            let probs = model.predict_proba(batch, true, rng)?;

            if probs.nrows() != end - start || probs.ncols() <= positive {
                return Err(EegError::Inference(format!(
                    "Model returned {:?} probabilities for a batch of {}",
                    probs.shape(),
                    end - start
                )));
            }
            for p in probs.column(positive).iter() {
                if !p.is_finite() {
                    return Err(EegError::Inference(format!(
                        "Non-finite probability {}",
                        p
                    )));
                }
                out.push(*p);
            }
        }
        Ok(out)
    }
}
