//! Sequence models over scaled price windows
//!
//! A model maps the last `seq_len` scaled prices to the next `horizon`
//! scaled prices. The forecast aligner only ever uses the first output
//! (`predict_step`) and reaches longer horizons by feeding predictions
//! back in, so any regressor honouring this contract can be swapped in.

use crate::error::Result;
use price_math::Window;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod linear;

pub use linear::{LinearSequenceModel, TrainedLinearModel};

/// Cooperative interrupt checked between training iterations
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask any training run holding a clone of this token to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a fit went
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    /// Epochs actually run (early stopping may cut the budget short)
    pub epochs_run: usize,
    /// Epoch whose parameters were kept, counted from 1
    pub best_epoch: usize,
    /// Training loss (MSE on scaled values) of the kept parameters
    pub best_loss: f64,
}

/// Trained model: pure, stateless prediction
pub trait TrainedSequenceModel: Debug {
    /// Predict the next `horizon` scaled values from `seq_len` scaled inputs
    fn predict(&self, input: &[f64]) -> Result<Vec<f64>>;

    /// Predict only the next scaled value
    fn predict_step(&self, input: &[f64]) -> Result<f64> {
        let outputs = self.predict(input)?;
        outputs.first().copied().ok_or_else(|| {
            crate::error::ForecastError::InvalidParameter(
                "Model produced an empty prediction".to_string(),
            )
        })
    }

    fn seq_len(&self) -> usize;

    fn horizon(&self) -> usize;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Untrained model specification
pub trait SequenceModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedSequenceModel;

    /// Fit on supervised windows, returning the best parameters seen
    fn fit(&self, windows: &[Window], cancel: &CancelToken) -> Result<(Self::Trained, FitSummary)>;

    /// Get the name of the model
    fn name(&self) -> &str;
}
