use super::{Optimizer, check_lens};
use crate::Result;

/// The running first and second moments of the gradient, one per parameter.
#[derive(Debug, Clone)]
struct Moments {
    mean: Vec<f32>,
    sq_mean: Vec<f32>,
}

impl Moments {
    fn zeros(len: usize) -> Self {
        Self {
            mean: vec![0.; len],
            sq_mean: vec![0.; len],
        }
    }
}

/// Adam, with bias corrected moments.
///
/// The moments are allocated on the first step after the parameter vector
/// they're stepping, and every later step must use a vector of the same size.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    steps: i32,
    moments: Option<Moments>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2` - The decay rates of the first and second moments.
    /// * `epsilon` - Keeps the update finite where the second moment is zero.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            steps: 0,
            moments: None,
        }
    }

    /// Creates a new `Adam` optimizer with the usual `0.9`, `0.999` and `1e-8` hyperparameters.
    pub fn with_defaults(learning_rate: f32) -> Self {
        Self::new(learning_rate, 0.9, 0.999, 1e-8)
    }

    /// The amount of steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps as usize
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_lens(grad, params)?;

        let moments = self
            .moments
            .get_or_insert_with(|| Moments::zeros(params.len()));
        check_lens(&moments.mean, params)?;

        self.steps += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let bc1 = 1. - b1.powi(self.steps);
        let bc2 = 1. - b2.powi(self.steps);

        for (i, (p, &g)) in params.iter_mut().zip(grad).enumerate() {
            let m = &mut moments.mean[i];
            let v = &mut moments.sq_mean[i];
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;

            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }

        Ok(())
    }
}
