use crate::{Result, arch::Parameters};

/// Defines the strategy for updating model parameters based on their accumulated gradients.
pub trait Optimizer {
    /// Resets the accumulated gradient of every parameter of `model`.
    fn zero_grad<P: Parameters + ?Sized>(&self, model: &mut P) {
        for mut param in model.parameters_mut() {
            param.grad.fill(0.0);
        }
    }

    /// Applies one update to every parameter of `model` using its accumulated gradient.
    ///
    /// # Returns
    /// An error if a parameter doesn't match the state kept for it.
    fn step<P: Parameters + ?Sized>(&mut self, model: &mut P) -> Result<()>;

    /// Returns the amount of successful `step` calls.
    fn steps(&self) -> u64;
}
