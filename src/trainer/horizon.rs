use serde::Serialize;

use crate::loss::HorizonSums;

/// Per-horizon metrics of an evaluation run.
///
/// Horizons without any valid position are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonReport {
    pub rmse: Vec<f32>,
    pub nll: Vec<f32>,
}

/// Accumulates per-horizon sums over the batches of an evaluation run.
#[derive(Debug, Clone, Default)]
pub(super) struct HorizonAccumulator {
    sq_err: Vec<f32>,
    nll: Vec<f32>,
    counts: Vec<f32>,
}

impl HorizonAccumulator {
    pub fn add(&mut self, mse: &HorizonSums, nll: &HorizonSums) {
        let len = mse.sums.len();
        if self.counts.len() < len {
            self.sq_err.resize(len, 0.);
            self.nll.resize(len, 0.);
            self.counts.resize(len, 0.);
        }

        for t in 0..len {
            self.sq_err[t] += mse.sums[t];
            self.nll[t] += nll.sums[t];
            self.counts[t] += mse.counts[t];
        }
    }

    pub fn finish(self) -> HorizonReport {
        let rmse = self
            .sq_err
            .iter()
            .zip(&self.counts)
            .map(|(s, c)| (s / c).sqrt())
            .collect();

        let nll = self
            .nll
            .iter()
            .zip(&self.counts)
            .map(|(s, c)| s / c)
            .collect();

        HorizonReport { rmse, nll }
    }
}
