use std::collections::HashMap;

use ndarray::{ArrayD, Zip};

use super::Optimizer;
use crate::{MlErr, Result, arch::Parameters};

/// Stochastic gradient descent with momentum:
///
/// ```text
/// v = mu * v + g
/// p = p - lr * v
/// ```
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
    velocity: HashMap<String, ArrayD<f32>>,
    steps: u64,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - How much of the previous velocity is carried into the next update.
    ///
    /// # Returns
    /// An error if `learning_rate` isn't positive and finite or `momentum` isn't in `[0, 1)`.
    pub fn new(learning_rate: f32, momentum: f32) -> Result<Self> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(MlErr::InvalidParameter {
                what: "learning rate",
                reason: format!("{learning_rate} is not a positive finite number"),
            });
        }

        if !(0.0..1.0).contains(&momentum) {
            return Err(MlErr::InvalidParameter {
                what: "momentum",
                reason: format!("{momentum} is not in [0, 1)"),
            });
        }

        Ok(Self {
            learning_rate,
            momentum,
            velocity: HashMap::new(),
            steps: 0,
        })
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for Sgd {
    fn step<P: Parameters + ?Sized>(&mut self, model: &mut P) -> Result<()> {
        let lr = self.learning_rate;
        let mu = self.momentum;

        let mut params = model.parameters_mut();

        // Validate every buffer before touching anything so a failed step leaves no trace.
        for param in &params {
            if let Some(v) = self.velocity.get(&param.name)
                && v.shape() != param.value.shape()
            {
                return Err(MlErr::SizeMismatch {
                    a: "velocity",
                    b: "parameter",
                    got: param.value.len(),
                    expected: v.len(),
                });
            }
        }

        for param in params.iter_mut() {
            let v = self
                .velocity
                .entry(param.name.clone())
                .or_insert_with(|| ArrayD::zeros(param.value.raw_dim()));

            Zip::from(&mut param.value)
                .and(&param.grad)
                .and(v)
                .for_each(|p, &g, v| {
                    *v = (mu * *v) + g;
                    *p -= lr * *v;
                });
        }

        self.steps += 1;
        Ok(())
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}
