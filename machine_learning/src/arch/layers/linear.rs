use ndarray::{linalg, prelude::*};
use rand::Rng;

use super::init;
use crate::{
    MlErr, Result,
    arch::{ParamMut, ParamRef, Parameters, param::Param},
};

/// A fully connected layer, `y = x · w + b`.
#[derive(Debug, Clone)]
pub struct Linear {
    dim: (usize, usize),
    weight: Param<Ix2>,
    bias: Param<Ix1>,

    // Forward metadata
    x: Option<Array2<f32>>,
}

impl Linear {
    /// Creates a new `Linear` layer with weights and biases drawn from
    /// `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    ///
    /// # Arguments
    /// * `dim` - The amount of input and output features.
    /// * `rng` - The random number generator used for initialization.
    pub fn new<R: Rng + ?Sized>(dim: (usize, usize), rng: &mut R) -> Result<Self> {
        let weight = init::uniform_fan_in(dim, dim.0, rng)?;
        let bias = init::uniform_fan_in(dim.1, dim.0, rng)?;

        Ok(Self {
            dim,
            weight: Param::new(weight),
            bias: Param::new(bias),
            x: None,
        })
    }

    /// Drops whatever the last forward pass recorded.
    pub(crate) fn clear_graph(&mut self) {
        self.x = None;
    }

    pub fn forward(&mut self, x: ArrayView2<f32>, tracking: bool) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                a: "linear input features",
                b: "linear layer inputs",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let mut z = x.dot(self.weight.value());
        z += self.bias.value();

        self.x = tracking.then(|| x.to_owned());
        Ok(z)
    }

    pub fn backward(&mut self, d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let x = self.x.take().ok_or(MlErr::NoGraph { layer: "linear" })?;

        linalg::general_mat_mul(1.0, &x.t(), &d, 1.0, self.weight.grad_mut());
        *self.bias.grad_mut() += &d.sum_axis(Axis(0));

        Ok(d.dot(&self.weight.value().t()))
    }
}

impl Parameters for Linear {
    fn parameters(&self) -> Vec<ParamRef<'_>> {
        vec![self.weight.named("weight"), self.bias.named("bias")]
    }

    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        vec![self.weight.named_mut("weight"), self.bias.named_mut("bias")]
    }
}
