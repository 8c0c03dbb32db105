mod kind;
mod mse;
mod nll;

use ndarray::{Array1, Array3, ArrayView3};

pub use kind::LossKind;
pub use mse::{masked_mse, masked_mse_test};
pub use nll::{masked_nll, masked_nll_test};

use crate::{EngineErr, Result};

/// The value of a masked loss and its gradient with respect to the prediction.
#[derive(Debug, Clone)]
pub struct MaskedLoss {
    pub value: f32,
    pub grad: Array3<f32>,
}

/// Per-horizon loss sums over a batch, with the amount of valid positions that went into each.
#[derive(Debug, Clone)]
pub struct HorizonSums {
    pub sums: Array1<f32>,
    pub counts: Array1<f32>,
}

/// Checks that `pred` is `[out_len, batch, >= channels]` and `fut`, `op_mask` are `[out_len, batch, 2]`.
///
/// # Returns
/// The `(out_len, batch)` pair.
fn check_shapes(
    pred: ArrayView3<f32>,
    fut: ArrayView3<f32>,
    op_mask: ArrayView3<f32>,
    channels: usize,
) -> Result<(usize, usize)> {
    let (out_len, batch, coords) = fut.dim();

    if coords != 2 {
        return Err(EngineErr::SizeMismatch {
            what: "future coordinates",
            got: coords,
            expected: 2,
        });
    }

    if op_mask.dim() != fut.dim() {
        return Err(EngineErr::SizeMismatch {
            what: "output mask elements",
            got: op_mask.len(),
            expected: fut.len(),
        });
    }

    let (pred_len, pred_batch, pred_channels) = pred.dim();
    if pred_len != out_len {
        return Err(EngineErr::SizeMismatch {
            what: "prediction horizon",
            got: pred_len,
            expected: out_len,
        });
    }

    if pred_batch != batch {
        return Err(EngineErr::SizeMismatch {
            what: "prediction batch",
            got: pred_batch,
            expected: batch,
        });
    }

    if pred_channels < channels {
        return Err(EngineErr::SizeMismatch {
            what: "prediction channels",
            got: pred_channels,
            expected: channels,
        });
    }

    Ok((out_len, batch))
}
