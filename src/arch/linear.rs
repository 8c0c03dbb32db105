use ndarray::{Array2, Array3, ArrayView3};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::{Dense, TrajPredictor};
use crate::{EngineErr, Result};

/// Amount of output channels per predicted position.
const OUT_CHANNELS: usize = 5;

/// A single dense layer mapping the flattened history to every future position at once.
///
/// The raw outputs go through `exp` for the inverse sigmas and `tanh` for the
/// correlation, the means are left untouched.
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    hist_len: usize,
    out_len: usize,
    dense: Dense,
    train: bool,

    // Forward metadata
    out: Array3<f32>,
}

impl LinearPredictor {
    /// Creates a new `LinearPredictor`.
    ///
    /// # Arguments
    /// * `hist_len` - The amount of observed positions per track.
    /// * `out_len` - The amount of predicted positions per track.
    ///
    /// # Returns
    /// A new `LinearPredictor` instance.
    pub fn new(hist_len: usize, out_len: usize) -> Self {
        Self {
            hist_len,
            out_len,
            dense: Dense::new((hist_len * 2, out_len * OUT_CHANNELS)),
            train: true,
            out: Array3::zeros((out_len, 0, OUT_CHANNELS)),
        }
    }

    pub fn hist_len(&self) -> usize {
        self.hist_len
    }

    pub fn out_len(&self) -> usize {
        self.out_len
    }

    pub fn is_train(&self) -> bool {
        self.train
    }

    /// Generates a fresh set of parameters, Xavier uniform weights and zero biases.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// The parameters, or an error if the Xavier range is invalid.
    pub fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let (fan_in, fan_out) = self.dense.dim();
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        let dist = Uniform::new(-range, range)?;

        let w_size = fan_in * fan_out;
        let mut params: Vec<f32> = dist.sample_iter(rng).take(w_size).collect();
        params.resize(self.size(), 0.);
        Ok(params)
    }

    fn activate(c: usize, z: f32) -> f32 {
        match c {
            2 | 3 => z.exp(),
            4 => z.tanh(),
            _ => z,
        }
    }

    /// The derivative of the activation of channel `c`, written in terms of its output.
    fn activate_df(c: usize, out: f32) -> f32 {
        match c {
            2 | 3 => out,
            4 => 1. - out * out,
            _ => 1.,
        }
    }
}

impl TrajPredictor for LinearPredictor {
    type Input = Array3<f32>;

    fn size(&self) -> usize {
        self.dense.size()
    }

    fn set_train(&mut self, train: bool) {
        self.train = train;
    }

    fn predict(&mut self, params: &[f32], hist: &Array3<f32>) -> Result<Array3<f32>> {
        let (hist_len, batch, coords) = hist.dim();
        if (hist_len, coords) != (self.hist_len, 2) {
            return Err(EngineErr::SizeMismatch {
                what: "history positions",
                got: hist_len * coords,
                expected: self.hist_len * 2,
            });
        }

        let x = Array2::from_shape_fn((batch, hist_len * 2), |(b, k)| hist[[k / 2, b, k % 2]]);
        let z = self.dense.forward(params, x.view())?;

        let out = Array3::from_shape_fn((self.out_len, batch, OUT_CHANNELS), |(t, b, c)| {
            Self::activate(c, z[[b, t * OUT_CHANNELS + c]])
        });

        self.out = out.clone();
        Ok(out)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d_pred: ArrayView3<f32>,
    ) -> Result<()> {
        if d_pred.dim() != self.out.dim() {
            return Err(EngineErr::SizeMismatch {
                what: "prediction gradient",
                got: d_pred.len(),
                expected: self.out.len(),
            });
        }

        let batch = self.out.dim().1;
        let out = &self.out;
        let d_z = Array2::from_shape_fn((batch, self.out_len * OUT_CHANNELS), |(b, k)| {
            let (t, c) = (k / OUT_CHANNELS, k % OUT_CHANNELS);
            d_pred[[t, b, c]] * Self::activate_df(c, out[[t, b, c]])
        });

        self.dense.backward(params, grad, d_z.view())?;
        Ok(())
    }
}
