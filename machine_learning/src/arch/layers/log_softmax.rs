use ndarray::prelude::*;

use crate::{MlErr, Result};

/// Row-wise log-softmax: `y_i = x_i - log(sum_j exp(x_j))`.
#[derive(Debug, Clone, Default)]
pub struct LogSoftmax {
    y: Option<Array2<f32>>,
}

impl LogSoftmax {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops whatever the last forward pass recorded.
    pub(crate) fn clear_graph(&mut self) {
        self.y = None;
    }

    pub fn forward(&mut self, mut x: Array2<f32>, tracking: bool) -> Array2<f32> {
        for mut row in x.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let lse = max + row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln();
            row.mapv_inplace(|v| v - lse);
        }

        self.y = tracking.then(|| x.clone());
        x
    }

    /// `dx = dy - softmax(x) * sum(dy)`, row-wise.
    pub fn backward(&mut self, d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let y = self.y.take().ok_or(MlErr::NoGraph { layer: "log_softmax" })?;

        let mut dx = d.to_owned();
        for ((mut dx, y), d) in dx.rows_mut().into_iter().zip(y.rows()).zip(d.rows()) {
            let total = d.sum();
            dx.zip_mut_with(&y, |dx, &y| *dx -= y.exp() * total);
        }

        Ok(dx)
    }
}
