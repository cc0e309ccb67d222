use ndarray::{Array2, ArrayView2, ArrayView4};

use super::Parameters;
use crate::error::Result;

/// Whether stochastic layers (dropout) are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

/// An image classifier: a batch of `[n, c, h, w]` images in, `[n, classes]` log-probabilities out.
pub trait Model: Parameters {
    /// Makes a forward pass through the network.
    ///
    /// While gradient tracking is enabled every layer keeps what it needs for `backward`, so this
    /// takes `&mut self` even though no parameter is modified.
    ///
    /// # Arguments
    /// * `x` - The input batch.
    ///
    /// # Returns
    /// The log-probabilities of each class for every sample, or a size mismatch error if `x`
    /// doesn't fit the network.
    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>>;

    /// Backpropagates `d` (the gradient of the loss with respect to the output of the last
    /// `forward`) and accumulates the result into the gradient of every parameter.
    ///
    /// # Errors
    /// `MlErr::NoGraph` if the last forward pass ran without gradient tracking.
    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()>;

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn train(&mut self) {
        self.set_mode(Mode::Train);
    }

    fn eval(&mut self) {
        self.set_mode(Mode::Eval);
    }

    fn grad_enabled(&self) -> bool;

    /// Enables or disables gradient tracking.
    ///
    /// # Returns
    /// The previous setting.
    fn set_grad_enabled(&mut self, enabled: bool) -> bool;
}
