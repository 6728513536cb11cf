//! Model contract, loading and caching

pub mod mlp;
pub mod registry;

pub use mlp::{DenseLayer, DropoutMlp, JsonModelLoader};
pub use registry::ModelRegistry;

use crate::error::Result;
use crate::types::TaskType;
use ndarray::{Array2, ArrayView4};
use rand::RngCore;
use std::sync::Arc;

/// Classifier whose forward pass may be stochastic (dropout active at inference).
///
/// Implementations must be reentrant: the ensemble calls `predict_proba`
/// concurrently from several threads, each with its own RNG.
pub trait StochasticModel: Send + Sync {
    /// Expected `(frames, channels, features)` of one sample
    fn input_shape(&self) -> (usize, usize, usize);

    fn num_classes(&self) -> usize;

    /// Class probabilities for a batch of segments, `(batch, classes)`
    fn predict_proba(
        &self,
        batch: ArrayView4<'_, f64>,
        stochastic: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>>;
}

/// Loads the model trained for a task
pub trait ModelLoader: Send + Sync {
    fn load(&self, task: TaskType) -> Result<Arc<dyn StochasticModel>>;
}
