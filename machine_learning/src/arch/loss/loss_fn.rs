use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::Result;

/// A classification loss over a batch of model outputs and their integer targets.
pub trait LossFn {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<f32>;
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<Array2<f32>>;
}
