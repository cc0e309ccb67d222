use ndarray::{Array, ArrayView, Dimension};

use crate::{MlErr, Result};

/// Rectified linear unit, `max(x, 0)`. NaNs pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct Relu<D: Dimension> {
    mask: Option<Array<bool, D>>,
}

impl<D: Dimension> Relu<D> {
    pub fn new() -> Self {
        Self { mask: None }
    }

    /// Drops whatever the last forward pass recorded.
    pub(crate) fn clear_graph(&mut self) {
        self.mask = None;
    }

    pub fn forward(&mut self, x: Array<f32, D>, tracking: bool) -> Array<f32, D> {
        let a = x.mapv_into(|v| if v < 0.0 { 0.0 } else { v });
        self.mask = tracking.then(|| a.mapv(|v| v > 0.0));
        a
    }

    pub fn backward(&mut self, d: ArrayView<f32, D>) -> Result<Array<f32, D>> {
        let mask = self.mask.take().ok_or(MlErr::NoGraph { layer: "relu" })?;

        let mut dx = d.to_owned();
        dx.zip_mut_with(&mask, |d, &active| {
            if !active {
                *d = 0.0;
            }
        });
        Ok(dx)
    }
}
