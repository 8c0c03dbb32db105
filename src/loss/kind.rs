use std::{
    fmt::{self, Display},
    str::FromStr,
};

use ndarray::ArrayView3;

use super::{MaskedLoss, masked_mse, masked_nll};
use crate::{EngineErr, Result};

/// The interchangeable training losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    Mse,
    Nll,
}

impl LossKind {
    /// Evaluates this loss over a batch.
    ///
    /// # Arguments
    /// * `pred` - The prediction, `[out_len, batch, 5]`.
    /// * `fut` - The ground truth, `[out_len, batch, 2]`.
    /// * `op_mask` - The output mask, same shape as `fut`.
    ///
    /// # Returns
    /// The loss and its gradient with respect to `pred`.
    pub fn compute(
        self,
        pred: ArrayView3<f32>,
        fut: ArrayView3<f32>,
        op_mask: ArrayView3<f32>,
    ) -> Result<MaskedLoss> {
        match self {
            LossKind::Mse => masked_mse(pred, fut, op_mask),
            LossKind::Nll => masked_nll(pred, fut, op_mask),
        }
    }
}

impl FromStr for LossKind {
    type Err = EngineErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MSE" => Ok(LossKind::Mse),
            "NLL" => Ok(LossKind::Nll),
            other => Err(EngineErr::InvalidConfig(format!(
                "unrecognized loss kind: {other}"
            ))),
        }
    }
}

impl Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LossKind::Mse => "MSE",
            LossKind::Nll => "NLL",
        };

        write!(f, "{s}")
    }
}
