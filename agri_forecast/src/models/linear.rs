//! Linear multi-output sequence regressor
//!
//! Every output is an affine function of the input window. Parameters are
//! fitted with mini-batch Adam on mean squared error; training stops early
//! once the epoch loss has not improved for `patience` epochs, and the best
//! parameters seen are the ones returned.

use crate::error::{ForecastError, Result};
use crate::models::{CancelToken, FitSummary, SequenceModel, TrainedSequenceModel};
use price_math::Window;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const INIT_STD: f64 = 0.01;

/// Linear sequence model with its training schedule
#[derive(Debug, Clone)]
pub struct LinearSequenceModel {
    /// Name of the model
    name: String,
    seq_len: usize,
    horizon: usize,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    patience: usize,
    seed: u64,
}

/// Fitted parameters of a [`LinearSequenceModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedLinearModel {
    name: String,
    seq_len: usize,
    horizon: usize,
    /// Row-major `horizon x seq_len`
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl LinearSequenceModel {
    /// Create a model mapping `seq_len` inputs to `horizon` outputs
    pub fn new(seq_len: usize, horizon: usize) -> Result<Self> {
        if seq_len == 0 || horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Sequence length and horizon must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Linear Sequence (seq_len={}, horizon={})", seq_len, horizon),
            seq_len,
            horizon,
            epochs: 40,
            batch_size: 64,
            learning_rate: 0.01,
            patience: 6,
            seed: 42,
        })
    }

    /// Set the optimisation schedule
    pub fn with_training(
        mut self,
        epochs: usize,
        batch_size: usize,
        learning_rate: f64,
        patience: usize,
    ) -> Result<Self> {
        if epochs == 0 || batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Epochs and batch size must be positive".to_string(),
            ));
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Learning rate must be a positive number".to_string(),
            ));
        }

        self.epochs = epochs;
        self.batch_size = batch_size;
        self.learning_rate = learning_rate;
        self.patience = patience;
        Ok(self)
    }

    /// Seed for weight initialisation and batch order
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn check_windows(&self, windows: &[Window]) -> Result<()> {
        if windows.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Cannot fit on zero windows".to_string(),
            ));
        }
        if let Some(bad) = windows
            .iter()
            .find(|w| w.input.len() != self.seq_len || w.target.len() != self.horizon)
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Window shape {}x{} does not match model {}x{}",
                bad.input.len(),
                bad.target.len(),
                self.seq_len,
                self.horizon
            )));
        }
        Ok(())
    }
}

/// Parameter layout: all weights, then all biases
fn forward(params: &[f64], seq_len: usize, horizon: usize, input: &[f64], out: &mut [f64]) {
    let (weights, bias) = params.split_at(seq_len * horizon);
    for h in 0..horizon {
        let row = &weights[h * seq_len..(h + 1) * seq_len];
        out[h] = bias[h] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
    }
}

fn mean_loss(params: &[f64], seq_len: usize, horizon: usize, windows: &[Window]) -> f64 {
    let mut out = vec![0.0; horizon];
    let mut total = 0.0;
    for window in windows {
        forward(params, seq_len, horizon, &window.input, &mut out);
        total += out
            .iter()
            .zip(&window.target)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>();
    }
    total / (windows.len() * horizon) as f64
}

/// Adam optimiser state over a flat parameter vector
struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
    learning_rate: f64,
}

impl Adam {
    fn new(len: usize, learning_rate: f64) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
            t: 0,
            learning_rate,
        }
    }

    fn step(&mut self, params: &mut [f64], grad: &[f64]) {
        self.t += 1;
        let m_correction = 1.0 - BETA1.powi(self.t);
        let v_correction = 1.0 - BETA2.powi(self.t);

        for i in 0..params.len() {
            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * grad[i];
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * grad[i] * grad[i];
            let m_hat = self.m[i] / m_correction;
            let v_hat = self.v[i] / v_correction;
            params[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        }
    }
}

impl SequenceModel for LinearSequenceModel {
    type Trained = TrainedLinearModel;

    fn fit(&self, windows: &[Window], cancel: &CancelToken) -> Result<(Self::Trained, FitSummary)> {
        self.check_windows(windows)?;

        let (s, h) = (self.seq_len, self.horizon);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let init = Normal::new(0.0, INIT_STD)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

        let mut params: Vec<f64> = (0..s * h).map(|_| init.sample(&mut rng)).collect();
        params.extend(std::iter::repeat(0.0).take(h));

        let mut optimiser = Adam::new(params.len(), self.learning_rate);
        let mut best_params = params.clone();
        let mut best_loss = mean_loss(&params, s, h, windows);
        let mut best_epoch = 0;
        let mut epochs_run = 0;
        let mut wait = 0;

        let mut order: Vec<usize> = (0..windows.len()).collect();
        let mut grad = vec![0.0; params.len()];
        let mut out = vec![0.0; h];

        for epoch in 1..=self.epochs {
            if cancel.is_cancelled() {
                return Err(ForecastError::Cancelled);
            }

            order.shuffle(&mut rng);
            for batch in order.chunks(self.batch_size) {
                grad.iter_mut().for_each(|g| *g = 0.0);
                let scale = 2.0 / (batch.len() * h) as f64;

                for &idx in batch {
                    let window = &windows[idx];
                    forward(&params, s, h, &window.input, &mut out);
                    for k in 0..h {
                        let err = (out[k] - window.target[k]) * scale;
                        let row = &mut grad[k * s..(k + 1) * s];
                        for (g, x) in row.iter_mut().zip(&window.input) {
                            *g += err * x;
                        }
                        grad[s * h + k] += err;
                    }
                }

                optimiser.step(&mut params, &grad);
            }

            epochs_run = epoch;
            let loss = mean_loss(&params, s, h, windows);
            debug!(epoch, loss, best_loss, "Finished training epoch");

            if loss < best_loss {
                best_loss = loss;
                best_params.copy_from_slice(&params);
                best_epoch = epoch;
                wait = 0;
            } else {
                wait += 1;
                if wait >= self.patience {
                    debug!(epoch, best_epoch, "Loss plateaued, stopping early");
                    break;
                }
            }
        }

        let bias = best_params.split_off(s * h);
        let trained = TrainedLinearModel {
            name: self.name.clone(),
            seq_len: s,
            horizon: h,
            weights: best_params,
            bias,
        };

        Ok((
            trained,
            FitSummary {
                epochs_run,
                best_epoch,
                best_loss,
            },
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedLinearModel {
    /// Mean squared error of the model over `windows`, in scaled units
    pub fn loss(&self, windows: &[Window]) -> f64 {
        let mut params = self.weights.clone();
        params.extend_from_slice(&self.bias);
        mean_loss(&params, self.seq_len, self.horizon, windows)
    }
}

impl TrainedSequenceModel for TrainedLinearModel {
    fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.seq_len {
            return Err(ForecastError::InvalidParameter(format!(
                "Expected an input window of {} values, got {}",
                self.seq_len,
                input.len()
            )));
        }

        let outputs = (0..self.horizon)
            .map(|k| {
                let row = &self.weights[k * self.seq_len..(k + 1) * self.seq_len];
                self.bias[k] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect();
        Ok(outputs)
    }

    fn seq_len(&self) -> usize {
        self.seq_len
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn name(&self) -> &str {
        &self.name
    }
}
