use super::{ModelLoader, StochasticModel};
use crate::error::{EegError, Result};
use crate::types::TaskType;
use ndarray::{Array1, Array2, ArrayView4, Axis};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fully connected layer, `weights` is `(outputs, inputs)`
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl DenseLayer {
    pub fn new(weights: Array2<f64>, bias: Array1<f64>) -> Self {
        Self { weights, bias }
    }

    pub fn zeros(outputs: usize, inputs: usize) -> Self {
        Self {
            weights: Array2::zeros((outputs, inputs)),
            bias: Array1::zeros(outputs),
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights.t()) + &self.bias
    }
}

/// On-disk layer representation
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerDocument {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// On-disk model representation (`<task>.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MlpDocument {
    task: TaskType,
    frames: usize,
    channels: usize,
    features: usize,
    hidden: LayerDocument,
    output: LayerDocument,
    #[serde(default)]
    dropout: f64,
}

/// Single hidden layer perceptron with inverted dropout after the hidden layer.
///
/// A segment `(frames, channels, features)` is flattened row-major into one
/// input vector. Non-finite feature values are fed as 0.
#[derive(Debug, Clone)]
pub struct DropoutMlp {
    task: TaskType,
    input_shape: (usize, usize, usize),
    hidden: DenseLayer,
    output: DenseLayer,
    dropout: f64,
}

impl DropoutMlp {
    pub fn new(
        task: TaskType,
        input_shape: (usize, usize, usize),
        hidden: DenseLayer,
        output: DenseLayer,
        dropout: f64,
    ) -> Result<Self> {
        let invalid = |reason: String| EegError::ModelLoad { task, reason };
        let (frames, channels, features) = input_shape;
        let input_len = frames * channels * features;

        if input_len == 0 {
            return Err(invalid(format!("Empty input shape {:?}", input_shape)));
        }
        if hidden.inputs() != input_len {
            return Err(invalid(format!(
                "Hidden layer expects {} inputs, input shape {:?} flattens to {}",
                hidden.inputs(),
                input_shape,
                input_len
            )));
        }
        if hidden.bias.len() != hidden.outputs() || output.bias.len() != output.outputs() {
            return Err(invalid("Bias length does not match layer width".to_string()));
        }
        if output.inputs() != hidden.outputs() {
            return Err(invalid(format!(
                "Output layer expects {} inputs, hidden layer has {} units",
                output.inputs(),
                hidden.outputs()
            )));
        }
        if output.outputs() == 0 {
            return Err(invalid("Model has no output classes".to_string()));
        }
        if !(0.0..1.0).contains(&dropout) {
            return Err(invalid(format!("Dropout rate {} outside [0, 1)", dropout)));
        }

        Ok(Self {
            task,
            input_shape,
            hidden,
            output,
            dropout,
        })
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    pub fn from_json(task: TaskType, json: &str) -> Result<Self> {
        let doc: MlpDocument = serde_json::from_str(json).map_err(|e| EegError::ModelLoad {
            task,
            reason: format!("Invalid model file: {}", e),
        })?;
        if doc.task != task {
            return Err(EegError::ModelLoad {
                task,
                reason: format!("Model file was trained for task '{}'", doc.task),
            });
        }

        let hidden = layer_from_document(task, "hidden", doc.hidden)?;
        let output = layer_from_document(task, "output", doc.output)?;
        Self::new(
            task,
            (doc.frames, doc.channels, doc.features),
            hidden,
            output,
            doc.dropout,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        let (frames, channels, features) = self.input_shape;
        let doc = MlpDocument {
            task: self.task,
            frames,
            channels,
            features,
            hidden: layer_to_document(&self.hidden),
            output: layer_to_document(&self.output),
            dropout: self.dropout,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn layer_from_document(task: TaskType, name: &str, doc: LayerDocument) -> Result<DenseLayer> {
    let outputs = doc.weights.len();
    let inputs = doc.weights.first().map_or(0, Vec::len);
    if doc.weights.iter().any(|row| row.len() != inputs) {
        return Err(EegError::ModelLoad {
            task,
            reason: format!("Ragged weight matrix in {} layer", name),
        });
    }

    let flat: Vec<f64> = doc.weights.into_iter().flatten().collect();
    let weights = Array2::from_shape_vec((outputs, inputs), flat).map_err(|e| {
        EegError::ModelLoad {
            task,
            reason: format!("{} layer: {}", name, e),
        }
    })?;
    Ok(DenseLayer::new(weights, Array1::from(doc.bias)))
}

fn layer_to_document(layer: &DenseLayer) -> LayerDocument {
    LayerDocument {
        weights: layer.weights.outer_iter().map(|row| row.to_vec()).collect(),
        bias: layer.bias.to_vec(),
    }
}

impl StochasticModel for DropoutMlp {
    fn input_shape(&self) -> (usize, usize, usize) {
        self.input_shape
    }

    fn num_classes(&self) -> usize {
        self.output.outputs()
    }

    fn predict_proba(
        &self,
        batch: ArrayView4<'_, f64>,
        stochastic: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>> {
        let (n, frames, channels, features) = batch.dim();
        if (frames, channels, features) != self.input_shape {
            return Err(EegError::Inference(format!(
                "{} model expects segments of shape {:?}, got {:?}",
                self.task,
                self.input_shape,
                (frames, channels, features)
            )));
        }

        let input_len = frames * channels * features;
        let flat: Vec<f64> = batch
            .iter()
            .map(|&v| if v.is_finite() { v } else { 0.0 })
            .collect();
        let x = Array2::from_shape_vec((n, input_len), flat)
            .map_err(|e| EegError::Inference(e.to_string()))?;

        let mut hidden = self.hidden.forward(&x);
        hidden.mapv_inplace(|v| v.max(0.0));

        if stochastic && self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            for v in hidden.iter_mut() {
                *v = if rng.random::<f64>() < keep { *v / keep } else { 0.0 };
            }
        }

        let mut logits = self.output.forward(&hidden);
        for mut row in logits.axis_iter_mut(Axis(0)) {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        Ok(logits)
    }
}

/// Reads `<model_dir>/<task>.json`
#[derive(Debug, Clone)]
pub struct JsonModelLoader {
    model_dir: PathBuf,
}

impl JsonModelLoader {
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_path(&self, task: TaskType) -> PathBuf {
        self.model_dir.join(format!("{}.json", task))
    }
}

impl ModelLoader for JsonModelLoader {
    fn load(&self, task: TaskType) -> Result<Arc<dyn StochasticModel>> {
        let path = self.model_path(task);
        let json = fs::read_to_string(&path).map_err(|e| EegError::ModelLoad {
            task,
            reason: format!("Cannot read {}: {}", path.display(), e),
        })?;
        let model = DropoutMlp::from_json(task, &json)?;

        log::info!(
            "Loaded {} model from {} (input {:?}, {} classes, dropout {})",
            task,
            path.display(),
            model.input_shape(),
            model.num_classes(),
            model.dropout()
        );
        Ok(Arc::new(model))
    }
}
