use ndarray::{Array3, ArrayView3};

use crate::Result;

/// A trajectory prediction network.
///
/// Like the layers it's built from, a predictor doesn't own its parameters: the
/// engine hands them over on every pass and only the optimizer mutates them.
pub trait TrajPredictor {
    /// The opaque part of a batch, everything but the future and its mask.
    type Input;

    /// Returns the amount of parameters of the predictor.
    fn size(&self) -> usize;

    /// Switches between training and inference behavior.
    fn set_train(&mut self, train: bool);

    /// Predicts the future trajectories of a batch.
    ///
    /// # Arguments
    /// * `params` - The predictor's parameters.
    /// * `inputs` - The batch inputs.
    ///
    /// # Returns
    /// The prediction shaped `[out_len, batch, 5]`, as `(mu_x, mu_y, sig_x, sig_y, rho)`.
    fn predict(&mut self, params: &[f32], inputs: &Self::Input) -> Result<Array3<f32>>;

    /// Back-propagates the loss gradient of the last prediction.
    ///
    /// # Arguments
    /// * `params` - The same parameters used for the last `predict` call.
    /// * `grad` - The buffer the parameter gradient is written to.
    /// * `d_pred` - The gradient of the loss with respect to the last prediction.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d_pred: ArrayView3<f32>) -> Result<()>;
}
