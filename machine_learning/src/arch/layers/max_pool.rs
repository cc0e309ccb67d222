use ndarray::{Zip, prelude::*};

use crate::{MlErr, Result};

/// Non overlapping `size` x `size` max pooling. Trailing rows/columns that don't fill a window
/// are dropped.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    size: usize,

    // Forward metadata: input shape and the flat in-window offset of every maximum.
    input_dim: (usize, usize, usize, usize),
    argmax: Option<Array4<usize>>,
}

impl MaxPool2d {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            input_dim: (0, 0, 0, 0),
            argmax: None,
        }
    }

    /// Drops whatever the last forward pass recorded.
    pub(crate) fn clear_graph(&mut self) {
        self.argmax = None;
    }

    pub fn forward(&mut self, x: ArrayView4<f32>, tracking: bool) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let k = self.size;
        let (oh, ow) = (h / k, w / k);
        if oh == 0 || ow == 0 {
            return Err(MlErr::SizeMismatch {
                a: "pooling input",
                b: "pooling window",
                got: h.min(w),
                expected: k,
            });
        }

        let mut out = Array4::zeros((n, c, oh, ow));
        let mut argmax = Array4::zeros((n, c, oh, ow));
        Zip::indexed(&mut out)
            .and(&mut argmax)
            .for_each(|(b, ch, i, j), out, arg| {
                let window = x.slice(s![b, ch, i * k..(i + 1) * k, j * k..(j + 1) * k]);
                let (best, value) = window.iter().enumerate().fold(
                    (0, f32::NEG_INFINITY),
                    |(best, max), (idx, &v)| {
                        // NaN wins so a diverged input stays visible downstream.
                        if v > max || v.is_nan() { (idx, v) } else { (best, max) }
                    },
                );
                *out = value;
                *arg = best;
            });

        self.input_dim = (n, c, h, w);
        self.argmax = tracking.then_some(argmax);
        Ok(out)
    }

    pub fn backward(&mut self, d: ArrayView4<f32>) -> Result<Array4<f32>> {
        let argmax = self.argmax.take().ok_or(MlErr::NoGraph { layer: "max_pool2d" })?;
        let k = self.size;

        let mut dx = Array4::zeros(self.input_dim);
        for ((b, ch, i, j), &arg) in argmax.indexed_iter() {
            let (wi, wj) = (arg / k, arg % k);
            dx[[b, ch, i * k + wi, j * k + wj]] += d[[b, ch, i, j]];
        }

        Ok(dx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_window_maxima() {
        let x = Array4::from_shape_vec(
            (1, 1, 4, 4),
            vec![
                1.0, 2.0, 0.0, -1.0, //
                3.0, 0.5, -2.0, -3.0, //
                0.0, 0.0, 9.0, 1.0, //
                0.0, 7.0, 1.0, 1.0, //
            ],
        )
        .unwrap();

        let mut pool = MaxPool2d::new(2);
        let y = pool.forward(x.view(), false).unwrap();
        assert_eq!(y.into_raw_vec_and_offset().0, vec![3.0, 0.0, 7.0, 9.0]);
    }

    #[test]
    fn odd_sizes_are_floored() {
        let mut pool = MaxPool2d::new(2);
        let x = Array4::zeros((2, 3, 5, 7));
        let y = pool.forward(x.view(), false).unwrap();
        assert_eq!(y.dim(), (2, 3, 2, 3));
    }

    #[test]
    fn backward_routes_gradient_to_maxima() {
        let x = Array4::from_shape_vec((1, 1, 2, 2), vec![1.0, 4.0, 2.0, 3.0]).unwrap();
        let mut pool = MaxPool2d::new(2);
        pool.forward(x.view(), true).unwrap();

        let dx = pool.backward(array![[[[5.0]]]].view()).unwrap();
        assert_eq!(dx, array![[[[0.0, 5.0], [0.0, 0.0]]]]);
    }
}
