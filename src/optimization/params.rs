use super::Optimizer;
use crate::{EngineErr, Result};

/// A model's flat parameter vector together with its gradient buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    values: Vec<f32>,
    grad: Vec<f32>,
}

impl Params {
    /// Creates a new `Params` holding `len` zeroes.
    pub fn zeros(len: usize) -> Self {
        Self::new(vec![0.; len])
    }

    /// Creates a new `Params` from existing values, with a zeroed gradient.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            grad: vec![0.; values.len()],
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Replaces the values, keeping the length.
    ///
    /// # Arguments
    /// * `values` - The new parameter values.
    ///
    /// # Returns
    /// An error if `values` doesn't have the same length as the current parameters.
    pub fn set_values(&mut self, values: Vec<f32>) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(EngineErr::SizeMismatch {
                what: "parameters",
                got: values.len(),
                expected: self.values.len(),
            });
        }

        self.values = values;
        Ok(())
    }

    /// Returns the values and the gradient buffer, the latter mutably, for a backward pass.
    pub fn split_mut(&mut self) -> (&[f32], &mut [f32]) {
        (&self.values, &mut self.grad)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Applies the current gradient onto the values.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer driving the update.
    pub fn step<O: Optimizer>(&mut self, optimizer: &mut O) -> Result<()> {
        optimizer.update_params(&self.grad, &mut self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::GradientDescent;

    #[test]
    fn step_applies_gradient_and_zero_grad_clears_it() {
        let mut params = Params::new(vec![1.0, 2.0]);
        let mut optimizer = GradientDescent::new(1.0);

        let (_, grad) = params.split_mut();
        grad.copy_from_slice(&[0.5, -1.0]);
        params.step(&mut optimizer).unwrap();
        assert_eq!(params.values(), [0.5, 3.0]);

        params.zero_grad();
        assert_eq!(params.grad(), [0.0, 0.0]);
    }

    #[test]
    fn set_values_keeps_length() {
        let mut params = Params::zeros(3);
        assert!(params.set_values(vec![1.0; 2]).is_err());
        params.set_values(vec![1.0; 3]).unwrap();
        assert_eq!(params.values(), [1.0; 3]);
    }
}
