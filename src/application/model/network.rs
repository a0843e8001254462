//! Feedforward binary classifier.
//!
//! Two ReLU hidden layers (64 then 32 units) with inverted dropout, a single
//! sigmoid output for P(next step is up), binary cross-entropy loss and a
//! per-layer Adam optimizer. Training always continues from the current
//! parameters; the network is never reinitialized once built.

use crate::domain::errors::EngineError;
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const HIDDEN_UNITS: [usize; 2] = [64, 32];
pub const DROPOUT_RATE: f64 = 0.2;
pub const LEARNING_RATE: f64 = 0.001;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const BCE_EPSILON: f64 = 1e-15;

/// Per-epoch training statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
        }
    }

    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => {
                let s = self.apply(z);
                &s * &(1.0 - &s)
            }
        }
    }
}

/// Adam moments, rebuilt lazily after a reload. Like the original browser
/// persistence, optimizer state is transient: only weights and biases
/// survive a save/load cycle, and predictions are unaffected.
#[derive(Debug, Clone, Default)]
struct AdamState {
    step: usize,
    m_w: Option<Array2<f64>>,
    v_w: Option<Array2<f64>>,
    m_b: Option<Array1<f64>>,
    v_b: Option<Array1<f64>>,
}

struct ForwardCache {
    input: Array2<f64>,
    pre_activation: Array2<f64>,
    dropout_mask: Option<Array2<f64>>,
}

#[derive(Serialize, Deserialize)]
struct Dense {
    weights: Array2<f64>,
    biases: Array1<f64>,
    activation: Activation,
    dropout: f64,
    #[serde(skip)]
    adam: AdamState,
    #[serde(skip)]
    cache: Option<ForwardCache>,
}

impl Dense {
    fn new(input_size: usize, output_size: usize, activation: Activation, dropout: f64) -> Self {
        // Xavier/Glorot initialization.
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        Self {
            weights: Array2::random((input_size, output_size), Uniform::new(-limit, limit)),
            biases: Array1::zeros(output_size),
            activation,
            dropout,
            adam: AdamState::default(),
            cache: None,
        }
    }

    /// Inference-only pass: no dropout, no gradient caching.
    fn infer(&self, input: &Array2<f64>) -> Array2<f64> {
        let z = input.dot(&self.weights) + &self.biases;
        self.activation.apply(&z)
    }

    fn forward_train<R: Rng>(&mut self, input: &Array2<f64>, rng: &mut R) -> Array2<f64> {
        let z = input.dot(&self.weights) + &self.biases;
        let mut output = self.activation.apply(&z);

        let dropout_mask = if self.dropout > 0.0 {
            // Inverted dropout keeps the expected activation unchanged.
            let keep = 1.0 - self.dropout;
            let mask = Array2::from_shape_fn(output.dim(), |_| {
                if rng.gen::<f64>() < keep {
                    1.0 / keep
                } else {
                    0.0
                }
            });
            output = &output * &mask;
            Some(mask)
        } else {
            None
        };

        self.cache = Some(ForwardCache {
            input: input.clone(),
            pre_activation: z,
            dropout_mask,
        });
        output
    }

    /// Backward pass. `grad` is the loss gradient with respect to this
    /// layer's output, except for the sigmoid/cross-entropy output layer
    /// where the fused gradient `(p - y) / n` arrives directly as dz.
    fn backward(
        &mut self,
        grad: &Array2<f64>,
        fused_output: bool,
    ) -> Result<Array2<f64>, EngineError> {
        let cache = self.cache.take().ok_or_else(|| EngineError::Training {
            reason: "backward called without a forward pass".to_string(),
        })?;

        let delta = if fused_output {
            grad.clone()
        } else {
            let grad = match &cache.dropout_mask {
                Some(mask) => grad * mask,
                None => grad.clone(),
            };
            &grad * &self.activation.derivative(&cache.pre_activation)
        };

        let weight_grad = cache.input.t().dot(&delta);
        let bias_grad = delta.sum_axis(Axis(0));
        let input_grad = delta.dot(&self.weights.t());

        self.adam_step(&weight_grad, &bias_grad);
        Ok(input_grad)
    }

    fn adam_step(&mut self, weight_grad: &Array2<f64>, bias_grad: &Array1<f64>) {
        self.adam.step += 1;
        let t = self.adam.step as i32;
        let bias_correction1 = 1.0 - ADAM_BETA1.powi(t);
        let bias_correction2 = 1.0 - ADAM_BETA2.powi(t);

        let m_w = self
            .adam
            .m_w
            .get_or_insert_with(|| Array2::zeros(self.weights.dim()));
        let v_w = self
            .adam
            .v_w
            .get_or_insert_with(|| Array2::zeros(self.weights.dim()));
        *m_w = &*m_w * ADAM_BETA1 + &(weight_grad * (1.0 - ADAM_BETA1));
        *v_w = &*v_w * ADAM_BETA2 + &(&(weight_grad * weight_grad) * (1.0 - ADAM_BETA2));
        let m_hat = &*m_w / bias_correction1;
        let v_hat = &*v_w / bias_correction2;
        self.weights =
            &self.weights - &(&m_hat * LEARNING_RATE / &(v_hat.mapv(f64::sqrt) + ADAM_EPSILON));

        let m_b = self
            .adam
            .m_b
            .get_or_insert_with(|| Array1::zeros(self.biases.len()));
        let v_b = self
            .adam
            .v_b
            .get_or_insert_with(|| Array1::zeros(self.biases.len()));
        *m_b = &*m_b * ADAM_BETA1 + &(bias_grad * (1.0 - ADAM_BETA1));
        *v_b = &*v_b * ADAM_BETA2 + &(&(bias_grad * bias_grad) * (1.0 - ADAM_BETA2));
        let m_hat = &*m_b / bias_correction1;
        let v_hat = &*v_b / bias_correction2;
        self.biases =
            &self.biases - &(&m_hat * LEARNING_RATE / &(v_hat.mapv(f64::sqrt) + ADAM_EPSILON));
    }
}

/// The probability classifier. Built once per input dimension, then updated
/// in place across retrains.
#[derive(Serialize, Deserialize)]
pub struct Classifier {
    layers: Vec<Dense>,
    input_dim: usize,
}

impl Classifier {
    pub fn new(input_dim: usize) -> Self {
        let layers = vec![
            Dense::new(input_dim, HIDDEN_UNITS[0], Activation::Relu, DROPOUT_RATE),
            Dense::new(
                HIDDEN_UNITS[0],
                HIDDEN_UNITS[1],
                Activation::Relu,
                DROPOUT_RATE,
            ),
            Dense::new(HIDDEN_UNITS[1], 1, Activation::Sigmoid, 0.0),
        ];
        Self { layers, input_dim }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn infer(&self, input: &Array2<f64>) -> Array2<f64> {
        self.layers
            .iter()
            .fold(input.clone(), |acc, layer| layer.infer(&acc))
    }

    /// Probability of an upward move for a single feature vector.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64, EngineError> {
        if features.len() != self.input_dim {
            return Err(EngineError::Prediction {
                reason: format!(
                    "expected {} features, got {}",
                    self.input_dim,
                    features.len()
                ),
            });
        }
        let input = Array2::from_shape_vec((1, self.input_dim), features.to_vec()).map_err(
            |e| EngineError::Prediction {
                reason: e.to_string(),
            },
        )?;
        Ok(self.infer(&input)[[0, 0]])
    }

    fn bce_loss(predictions: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let n = predictions.nrows() as f64;
        let p = predictions.mapv(|v| v.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON));
        let loss = targets * &p.mapv(f64::ln) + &(1.0 - targets) * &(1.0 - &p).mapv(f64::ln);
        -loss.sum() / n
    }

    fn accuracy(&self, x: &Array2<f64>, y: &Array2<f64>) -> f64 {
        let predictions = self.infer(x);
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|&(&p, &label)| (p >= 0.5) == (label >= 0.5))
            .count();
        correct as f64 / y.nrows() as f64
    }

    /// Continue training the existing parameters for `epochs` passes of
    /// shuffled mini-batches. Repeated calls over growing datasets
    /// accumulate learned structure.
    pub fn train(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<EpochStats>, EngineError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(EngineError::Training {
                reason: format!("misaligned dataset: {} features, {} labels", x.len(), y.len()),
            });
        }
        if let Some(row) = x.iter().find(|row| row.len() != self.input_dim) {
            return Err(EngineError::Training {
                reason: format!(
                    "feature row of width {} does not match input dim {}",
                    row.len(),
                    self.input_dim
                ),
            });
        }
        let batch_size = batch_size.max(1);

        let n = x.len();
        let flat: Vec<f64> = x.iter().flatten().copied().collect();
        let x_all =
            Array2::from_shape_vec((n, self.input_dim), flat).map_err(|e| EngineError::Training {
                reason: e.to_string(),
            })?;
        let y_all =
            Array2::from_shape_vec((n, 1), y.to_vec()).map_err(|e| EngineError::Training {
                reason: e.to_string(),
            })?;

        let mut rng = rand::thread_rng();
        let mut history = Vec::with_capacity(epochs);
        let mut indices: Vec<usize> = (0..n).collect();

        for _ in 0..epochs {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut batches = 0usize;

            for batch in indices.chunks(batch_size) {
                let x_batch = x_all.select(Axis(0), batch);
                let y_batch = y_all.select(Axis(0), batch);

                let mut activations = x_batch.clone();
                for layer in self.layers.iter_mut() {
                    activations = layer.forward_train(&activations, &mut rng);
                }
                epoch_loss += Self::bce_loss(&activations, &y_batch);
                batches += 1;

                // Fused sigmoid + cross-entropy gradient with respect to the
                // output pre-activation.
                let mut grad = (&activations - &y_batch) / batch.len() as f64;
                let last = self.layers.len() - 1;
                for (idx, layer) in self.layers.iter_mut().enumerate().rev() {
                    grad = layer.backward(&grad, idx == last)?;
                }
            }

            history.push(EpochStats {
                loss: epoch_loss / batches as f64,
                accuracy: self.accuracy(&x_all, &y_all),
            });
        }

        Ok(history)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(self).map_err(|e| EngineError::Persistence {
            reason: e.to_string(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        serde_json::from_slice(bytes).map_err(|e| EngineError::Persistence {
            reason: e.to_string(),
        })
    }
}
