use ndarray::Array3;

use crate::{EngineErr, Result};

/// A training batch.
///
/// Only the trailing future trajectory and output mask are read by the engine,
/// `inputs` is handed over untouched to the predictor.
///
/// * `fut` - The ground truth future, shaped `[out_len, batch, 2]`.
/// * `op_mask` - 1.0 for the valid future positions and 0.0 for padding, same shape as `fut`.
#[derive(Debug, Clone)]
pub struct TrajBatch<I> {
    pub inputs: I,
    pub fut: Array3<f32>,
    pub op_mask: Array3<f32>,
}

impl<I> TrajBatch<I> {
    /// Creates a new `TrajBatch`.
    ///
    /// # Arguments
    /// * `inputs` - The predictor's inputs.
    /// * `fut` - The future trajectory.
    /// * `op_mask` - The output mask.
    ///
    /// # Returns
    /// A new `TrajBatch` or an error if `fut` and `op_mask` shapes disagree.
    pub fn new(inputs: I, fut: Array3<f32>, op_mask: Array3<f32>) -> Result<Self> {
        if fut.shape() != op_mask.shape() {
            return Err(EngineErr::SizeMismatch {
                what: "output mask elements",
                got: op_mask.len(),
                expected: fut.len(),
            });
        }

        let coords = fut.dim().2;
        if coords != 2 {
            return Err(EngineErr::SizeMismatch {
                what: "future coordinates",
                got: coords,
                expected: 2,
            });
        }

        Ok(Self {
            inputs,
            fut,
            op_mask,
        })
    }

    #[inline]
    pub fn out_len(&self) -> usize {
        self.fut.dim().0
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.fut.dim().1
    }
}
