use ndarray::{Array2, ArrayView1, ArrayView2};

use super::LossFn;
use crate::{MlErr, Result};

/// How the per-sample losses of a batch are combined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

/// Negative log-likelihood loss over log-probabilities, `-y_pred[i, y[i]]` per sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct Nll {
    reduction: Reduction,
}

impl Nll {
    /// Returns a new `Nll`.
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn mean() -> Self {
        Self::new(Reduction::Mean)
    }

    pub fn sum() -> Self {
        Self::new(Reduction::Sum)
    }

    fn check(&self, y_pred: &ArrayView2<f32>, y: &ArrayView1<usize>) -> Result<()> {
        if y_pred.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                a: "predictions",
                b: "targets",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        let classes = y_pred.ncols();
        if let Some((index, &label)) = y.indexed_iter().find(|(_, label)| **label >= classes) {
            return Err(MlErr::InvalidTarget {
                index,
                label,
                classes,
            });
        }

        Ok(())
    }

    fn scale(&self, n: usize) -> f32 {
        match self.reduction {
            Reduction::Mean if n > 0 => 1.0 / n as f32,
            _ => 1.0,
        }
    }
}

impl LossFn for Nll {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<f32> {
        self.check(&y_pred, &y)?;

        let total: f32 = y
            .iter()
            .zip(y_pred.rows())
            .map(|(&label, row)| -row[label])
            .sum();

        Ok(total * self.scale(y.len()))
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<Array2<f32>> {
        self.check(&y_pred, &y)?;

        let scale = self.scale(y.len());
        let mut d = Array2::zeros(y_pred.raw_dim());
        for (mut row, &label) in d.rows_mut().into_iter().zip(&y) {
            row[label] = -scale;
        }

        Ok(d)
    }
}
