use ndarray::{Array1, Array3, ArrayView3};

use super::{HorizonSums, MaskedLoss, check_shapes};
use crate::Result;

/// ln(2π), the normalization term of the bivariate gaussian.
const LOG_TWO_PI: f32 = 1.8379;

/// The parameters of a predicted bivariate gaussian at one position.
///
/// `sig_x` and `sig_y` are inverse standard deviations.
#[derive(Debug, Clone, Copy)]
struct Gaussian {
    mu_x: f32,
    mu_y: f32,
    sig_x: f32,
    sig_y: f32,
    rho: f32,
}

impl Gaussian {
    fn at(pred: &ArrayView3<f32>, t: usize, b: usize) -> Self {
        Self {
            mu_x: pred[[t, b, 0]],
            mu_y: pred[[t, b, 1]],
            sig_x: pred[[t, b, 2]],
            sig_y: pred[[t, b, 3]],
            rho: pred[[t, b, 4]],
        }
    }

    /// Returns the negative log likelihood of `(x, y)`.
    fn nll(&self, x: f32, y: f32) -> f32 {
        let Self {
            mu_x,
            mu_y,
            sig_x,
            sig_y,
            rho,
        } = *self;

        let q = 1.0 - rho * rho;
        let dx = x - mu_x;
        let dy = y - mu_y;
        let z = sig_x * sig_x * dx * dx + sig_y * sig_y * dy * dy
            - 2.0 * rho * sig_x * sig_y * dx * dy;

        0.5 * z / q - (sig_x * sig_y).ln() + 0.5 * q.ln() + LOG_TWO_PI
    }

    /// Returns the gradient of `nll` with respect to `(mu_x, mu_y, sig_x, sig_y, rho)`.
    fn nll_grad(&self, x: f32, y: f32) -> [f32; 5] {
        let Self {
            mu_x,
            mu_y,
            sig_x,
            sig_y,
            rho,
        } = *self;

        let q = 1.0 - rho * rho;
        let dx = x - mu_x;
        let dy = y - mu_y;
        let cross = sig_x * sig_y * dx * dy;
        let z = sig_x * sig_x * dx * dx + sig_y * sig_y * dy * dy - 2.0 * rho * cross;

        [
            -(sig_x * sig_x * dx - rho * sig_x * sig_y * dy) / q,
            -(sig_y * sig_y * dy - rho * sig_x * sig_y * dx) / q,
            (sig_x * dx * dx - rho * sig_y * dx * dy) / q - 1.0 / sig_x,
            (sig_y * dy * dy - rho * sig_x * dx * dy) / q - 1.0 / sig_y,
            (rho * z - cross * q) / (q * q) - rho / q,
        ]
    }
}

/// Masked negative log likelihood of the ground truth under the predicted bivariate gaussians.
///
/// Each position is weighted by the sum of its two mask channels, a fully masked
/// batch yields a zero loss.
///
/// # Arguments
/// * `pred` - The prediction, `[out_len, batch, 5]` as `(mu_x, mu_y, sig_x, sig_y, rho)`.
/// * `fut` - The ground truth, `[out_len, batch, 2]`.
/// * `op_mask` - The output mask, same shape as `fut`.
///
/// # Returns
/// The loss and its gradient with respect to `pred`.
pub fn masked_nll(
    pred: ArrayView3<f32>,
    fut: ArrayView3<f32>,
    op_mask: ArrayView3<f32>,
) -> Result<MaskedLoss> {
    let (out_len, batch) = check_shapes(pred, fut, op_mask, 5)?;
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

            let gaussian = Gaussian::at(&pred, t, b);
            let (x, y) = (fut[[t, b, 0]], fut[[t, b, 1]]);

            acc += w * gaussian.nll(x, y);
            for (c, g) in gaussian.nll_grad(x, y).into_iter().enumerate() {
                grad[[t, b, c]] = w * g / denom;
            }
        }
    }

    Ok(MaskedLoss {
        value: acc / denom,
        grad,
    })
}

/// Per-horizon negative log likelihood sums, used for evaluation reports.
///
/// # Arguments
/// * `pred` - The prediction, `[out_len, batch, 5]`.
/// * `fut` - The ground truth, `[out_len, batch, 2]`.
/// * `op_mask` - The output mask, same shape as `fut`.
///
/// # Returns
/// For every timestep, the summed likelihood over the valid positions and their count.
pub fn masked_nll_test(
    pred: ArrayView3<f32>,
    fut: ArrayView3<f32>,
    op_mask: ArrayView3<f32>,
) -> Result<HorizonSums> {
    let (out_len, batch) = check_shapes(pred, fut, op_mask, 5)?;
    let mut sums = Array1::zeros(out_len);
    let mut counts = Array1::zeros(out_len);

    for t in 0..out_len {
        for b in 0..batch {
            let m = op_mask[[t, b, 0]];
            if m == 0.0 {
                continue;
            }

            let gaussian = Gaussian::at(&pred, t, b);
            sums[t] += m * gaussian.nll(fut[[t, b, 0]], fut[[t, b, 1]]);
            counts[t] += m;
        }
    }

    Ok(HorizonSums { sums, counts })
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    fn prediction() -> Array3<f32> {
        Array3::from_shape_fn((3, 2, 5), |(t, b, c)| match c {
            0 => 0.5 * t as f32 - 0.2 * b as f32,
            1 => 0.1 * (t + b) as f32,
            2 => 0.8 + 0.1 * t as f32,
            3 => 1.2 - 0.1 * b as f32,
            _ => 0.3 - 0.2 * b as f32,
        })
    }

    fn future() -> Array3<f32> {
        Array3::from_shape_fn((3, 2, 2), |(t, b, c)| 0.4 * (t + c) as f32 - 0.3 * b as f32)
    }

    #[test]
    fn standard_gaussian_at_its_mean() {
        let mut pred = Array3::zeros((1, 1, 5));
        pred[[0, 0, 2]] = 1.0;
        pred[[0, 0, 3]] = 1.0;

        let fut = Array3::zeros((1, 1, 2));
        let mask = Array3::ones((1, 1, 2));

        let loss = masked_nll(pred.view(), fut.view(), mask.view()).unwrap();
        assert!((loss.value - LOG_TWO_PI).abs() < 1e-6);
    }

    #[test]
    fn ignores_masked_positions() {
        let pred = prediction();
        let fut = future();
        let mut mask = Array3::ones((3, 2, 2));
        for c in 0..2 {
            mask[[2, 0, c]] = 0.0;
        }

        let loss = masked_nll(pred.view(), fut.view(), mask.view()).unwrap();
        assert!((0..5).all(|c| loss.grad[[2, 0, c]] == 0.0));

        // moving a masked mean doesn't change the loss
        let mut moved = pred.clone();
        moved[[2, 0, 0]] += 50.0;
        let moved = masked_nll(moved.view(), fut.view(), mask.view()).unwrap();
        assert_eq!(loss.value, moved.value);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let pred = prediction();
        let fut = future();
        let mut mask = Array3::ones((3, 2, 2));
        mask[[1, 1, 0]] = 0.0;
        mask[[1, 1, 1]] = 0.0;

        let loss = masked_nll(pred.view(), fut.view(), mask.view()).unwrap();

        let eps = 1e-2;
        for t in 0..3 {
            for c in 0..5 {
                let idx = [t, 0, c];
                let mut plus = pred.clone();
                let mut minus = pred.clone();
                plus[idx] += eps;
                minus[idx] -= eps;

                let lp = masked_nll(plus.view(), fut.view(), mask.view()).unwrap().value;
                let lm = masked_nll(minus.view(), fut.view(), mask.view()).unwrap().value;
                let numeric = (lp - lm) / (2.0 * eps);

                assert!(
                    (numeric - loss.grad[idx]).abs() < 5e-3,
                    "{idx:?}: numeric {numeric}, analytic {}",
                    loss.grad[idx]
                );
            }
        }
    }

    #[test]
    fn horizon_sums_only_count_valid_positions() {
        let pred = prediction();
        let fut = future();
        let mut mask = Array3::ones((3, 2, 2));
        mask[[0, 1, 0]] = 0.0;
        mask[[0, 1, 1]] = 0.0;

        let sums = masked_nll_test(pred.view(), fut.view(), mask.view()).unwrap();
        assert_eq!(sums.counts.to_vec(), [1.0, 2.0, 2.0]);

        let p = pred.view();
        let expected = Gaussian::at(&p, 0, 0).nll(fut[[0, 0, 0]], fut[[0, 0, 1]]);
        assert!((sums.sums[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn requires_five_channels() {
        let pred = Array3::zeros((2, 1, 2));
        let fut = Array3::zeros((2, 1, 2));
        let mask = Array3::ones((2, 1, 2));
        assert!(masked_nll(pred.view(), fut.view(), mask.view()).is_err());
    }
}
