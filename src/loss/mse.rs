use ndarray::{Array1, Array3, ArrayView3};

use super::{HorizonSums, MaskedLoss, check_shapes};
use crate::Result;

/// Masked mean squared displacement between the predicted means and the ground truth.
///
/// Only the `mu_x`, `mu_y` channels of `pred` are read. Each position is weighted
/// by the sum of its two mask channels, so a fully masked batch yields a zero loss.
///
/// # Arguments
/// * `pred` - The prediction, `[out_len, batch, >= 2]`.
/// * `fut` - The ground truth, `[out_len, batch, 2]`.
/// * `op_mask` - The output mask, same shape as `fut`.
///
/// # Returns
/// The loss and its gradient with respect to `pred`.
pub fn masked_mse(
    pred: ArrayView3<f32>,
    fut: ArrayView3<f32>,
    op_mask: ArrayView3<f32>,
) -> Result<MaskedLoss> {
    let (out_len, batch) = check_shapes(pred, fut, op_mask, 2)?;
    let mut grad = Array3::zeros(pred.raw_dim());

    let denom = op_mask.sum();
    if denom == 0.0 {
        return Ok(MaskedLoss { value: 0.0, grad });
    }

    let mut acc = 0.0;
    for t in 0..out_len {
        for b in 0..batch {
            let w = op_mask[[t, b, 0]] + op_mask[[t, b, 1]];
            if w == 0.0 {
                continue;
            }

            let dx = pred[[t, b, 0]] - fut[[t, b, 0]];
            let dy = pred[[t, b, 1]] - fut[[t, b, 1]];

            acc += w * (dx * dx + dy * dy);
            grad[[t, b, 0]] = 2.0 * w * dx / denom;
            grad[[t, b, 1]] = 2.0 * w * dy / denom;
        }
    }

    Ok(MaskedLoss {
        value: acc / denom,
        grad,
    })
}

/// Per-horizon squared displacement sums, used for RMSE reporting.
///
/// # Arguments
/// * `pred` - The prediction, `[out_len, batch, >= 2]`.
/// * `fut` - The ground truth, `[out_len, batch, 2]`.
/// * `op_mask` - The output mask, same shape as `fut`.
///
/// # Returns
/// For every timestep, the sum of squared errors over the valid positions and their count.
pub fn masked_mse_test(
    pred: ArrayView3<f32>,
    fut: ArrayView3<f32>,
    op_mask: ArrayView3<f32>,
) -> Result<HorizonSums> {
    let (out_len, batch) = check_shapes(pred, fut, op_mask, 2)?;
    let mut sums = Array1::zeros(out_len);
    let mut counts = Array1::zeros(out_len);

    for t in 0..out_len {
        for b in 0..batch {
            let m = op_mask[[t, b, 0]];
            let dx = pred[[t, b, 0]] - fut[[t, b, 0]];
            let dy = pred[[t, b, 1]] - fut[[t, b, 1]];

            sums[t] += m * (dx * dx + dy * dy);
            counts[t] += m;
        }
    }

    Ok(HorizonSums { sums, counts })
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    #[test]
    fn ignores_masked_positions() {
        // two timesteps, one sample, the second step is padding with a huge error
        let mut pred = Array3::zeros((2, 1, 5));
        pred[[0, 0, 0]] = 1.0;
        pred[[0, 0, 1]] = 2.0;
        pred[[1, 0, 0]] = 100.0;

        let fut = Array3::zeros((2, 1, 2));
        let mut mask = Array3::zeros((2, 1, 2));
        mask[[0, 0, 0]] = 1.0;
        mask[[0, 0, 1]] = 1.0;

        let loss = masked_mse(pred.view(), fut.view(), mask.view()).unwrap();
        assert_eq!(loss.value, 5.0);
        assert_eq!(loss.grad[[1, 0, 0]], 0.0);
        assert_eq!(loss.grad[[0, 0, 0]], 2.0);
        assert_eq!(loss.grad[[0, 0, 1]], 4.0);
        assert_eq!(loss.grad[[0, 0, 2]], 0.0);
    }

    #[test]
    fn empty_mask_is_zero() {
        let pred = Array3::ones((3, 2, 5));
        let fut = Array3::zeros((3, 2, 2));
        let mask = Array3::zeros((3, 2, 2));

        let loss = masked_mse(pred.view(), fut.view(), mask.view()).unwrap();
        assert_eq!(loss.value, 0.0);
        assert!(loss.grad.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let pred = Array3::from_shape_fn((2, 2, 5), |(t, b, c)| 0.3 * (t + 2 * b + c) as f32);
        let fut = Array3::from_shape_fn((2, 2, 2), |(t, b, c)| 0.1 * (t * b + c) as f32);
        let mut mask = Array3::ones((2, 2, 2));
        mask[[1, 1, 0]] = 0.0;
        mask[[1, 1, 1]] = 0.0;

        let loss = masked_mse(pred.view(), fut.view(), mask.view()).unwrap();

        let eps = 1e-2;
        for idx in [[0, 0, 0], [0, 1, 1], [1, 0, 0], [1, 1, 1]] {
            let mut plus = pred.clone();
            let mut minus = pred.clone();
            plus[idx] += eps;
            minus[idx] -= eps;

            let lp = masked_mse(plus.view(), fut.view(), mask.view()).unwrap().value;
            let lm = masked_mse(minus.view(), fut.view(), mask.view()).unwrap().value;
            let numeric = (lp - lm) / (2.0 * eps);

            assert!(
                (numeric - loss.grad[idx]).abs() < 1e-3,
                "{idx:?}: numeric {numeric}, analytic {}",
                loss.grad[idx]
            );
        }
    }

    #[test]
    fn horizon_sums_per_timestep() {
        let mut pred = Array3::zeros((2, 2, 5));
        pred[[0, 0, 0]] = 3.0;
        pred[[1, 1, 1]] = 2.0;
        pred[[1, 0, 0]] = 9.0;

        let fut = Array3::zeros((2, 2, 2));
        let mut mask = Array3::ones((2, 2, 2));
        mask[[1, 0, 0]] = 0.0;
        mask[[1, 0, 1]] = 0.0;

        let sums = masked_mse_test(pred.view(), fut.view(), mask.view()).unwrap();
        assert_eq!(sums.sums.to_vec(), [9.0, 4.0]);
        assert_eq!(sums.counts.to_vec(), [2.0, 1.0]);
    }

    #[test]
    fn rejects_mismatching_shapes() {
        let pred = Array3::zeros((3, 2, 5));
        let fut = Array3::zeros((2, 2, 2));
        let mask = Array3::zeros((2, 2, 2));
        assert!(masked_mse(pred.view(), fut.view(), mask.view()).is_err());
    }
}
