use ndarray::{Zip, linalg, prelude::*};
use rand::Rng;

use super::init;
use crate::{
    MlErr, Result,
    arch::{ParamMut, ParamRef, Parameters, param::Param},
};

/// A 2D convolution with stride 1 and no padding.
///
/// The weight is stored as a `[out_channels, in_channels * kernel * kernel]` matrix, the row-major
/// flattening of `[out_channels, in_channels, kernel, kernel]`, so both passes are plain matrix
/// products over unfolded input patches.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    weight: Param<Ix2>,
    bias: Param<Ix1>,

    // Forward metadata
    input_dim: (usize, usize, usize, usize),
    cols: Option<Array3<f32>>,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `in_channels` - Channels of the input images.
    /// * `out_channels` - Amount of filters.
    /// * `kernel` - Side of the square filters.
    /// * `rng` - The random number generator used for initialization.
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let fan_in = in_channels * kernel * kernel;
        let weight = init::uniform_fan_in((out_channels, fan_in), fan_in, rng)?;
        let bias = init::uniform_fan_in(out_channels, fan_in, rng)?;

        Ok(Self {
            in_channels,
            out_channels,
            kernel,
            weight: Param::new(weight),
            bias: Param::new(bias),
            input_dim: (0, 0, 0, 0),
            cols: None,
        })
    }

    /// Returns the spatial size of the output for an `h` x `w` input.
    pub fn output_size(&self, h: usize, w: usize) -> Option<(usize, usize)> {
        let k = self.kernel;
        (h >= k && w >= k).then(|| (h - k + 1, w - k + 1))
    }

    /// Drops whatever the last forward pass recorded.
    pub(crate) fn clear_graph(&mut self) {
        self.cols = None;
    }

    pub fn forward(&mut self, x: ArrayView4<f32>, tracking: bool) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.in_channels {
            return Err(MlErr::SizeMismatch {
                a: "input channels",
                b: "convolution input channels",
                got: c,
                expected: self.in_channels,
            });
        }

        let (oh, ow) = self.output_size(h, w).ok_or(MlErr::SizeMismatch {
            a: "input height",
            b: "convolution kernel",
            got: h.min(w),
            expected: self.kernel,
        })?;

        let k = self.kernel;
        let mut cols = Array3::zeros((n, c * k * k, oh * ow));
        Zip::from(cols.outer_iter_mut())
            .and(x.outer_iter())
            .par_for_each(|cols, x| im2col(x, k, cols));

        let weight = self.weight.value().view();
        let bias = self.bias.value().view();
        let mut out = Array4::zeros((n, self.out_channels, oh, ow));
        Zip::from(out.outer_iter_mut())
            .and(cols.outer_iter())
            .par_for_each(|mut out, cols| {
                let y = weight.dot(&cols);
                for ((mut dst, src), &b) in out.outer_iter_mut().zip(y.outer_iter()).zip(&bias) {
                    dst.iter_mut().zip(src).for_each(|(d, &s)| *d = s + b);
                }
            });

        self.input_dim = (n, c, h, w);
        self.cols = tracking.then_some(cols);
        Ok(out)
    }

    pub fn backward(&mut self, d: ArrayView4<f32>) -> Result<Array4<f32>> {
        let cols = self.cols.take().ok_or(MlErr::NoGraph { layer: "conv2d" })?;
        let (_, o, oh, ow) = d.dim();
        let k = self.kernel;

        let mut dx = Array4::zeros(self.input_dim);
        for ((d, cols), mut dx) in d.outer_iter().zip(cols.outer_iter()).zip(dx.outer_iter_mut()) {
            let d = Array2::from_shape_fn((o, oh * ow), |(c, p)| d[[c, p / ow, p % ow]]);

            linalg::general_mat_mul(1.0, &d, &cols.t(), 1.0, self.weight.grad_mut());
            *self.bias.grad_mut() += &d.sum_axis(Axis(1));

            let dcols = self.weight.value().t().dot(&d);
            col2im(dcols.view(), k, dx.view_mut());
        }

        Ok(dx)
    }
}

impl Parameters for Conv2d {
    fn parameters(&self) -> Vec<ParamRef<'_>> {
        vec![self.weight.named("weight"), self.bias.named("bias")]
    }

    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        vec![self.weight.named_mut("weight"), self.bias.named_mut("bias")]
    }
}

/// Unfolds every `k` x `k` patch of `x` (`[c, h, w]`) into a column of `cols`
/// (`[c * k * k, oh * ow]`).
fn im2col(x: ArrayView3<f32>, k: usize, mut cols: ArrayViewMut2<f32>) {
    let (c, h, w) = x.dim();
    let (oh, ow) = (h - k + 1, w - k + 1);

    for ci in 0..c {
        for ki in 0..k {
            for kj in 0..k {
                let row = (ci * k + ki) * k + kj;
                let patch = x.slice(s![ci, ki..ki + oh, kj..kj + ow]);
                cols.row_mut(row)
                    .iter_mut()
                    .zip(patch.iter())
                    .for_each(|(dst, &src)| *dst = src);
            }
        }
    }
}

/// The adjoint of `im2col`: scatters and sums the columns of `cols` back into `dx`.
fn col2im(cols: ArrayView2<f32>, k: usize, mut dx: ArrayViewMut3<f32>) {
    let (c, h, w) = dx.dim();
    let (oh, ow) = (h - k + 1, w - k + 1);

    for ci in 0..c {
        for ki in 0..k {
            for kj in 0..k {
                let row = (ci * k + ki) * k + kj;
                dx.slice_mut(s![ci, ki..ki + oh, kj..kj + ow])
                    .iter_mut()
                    .zip(cols.row(row))
                    .for_each(|(dst, &src)| *dst += src);
            }
        }
    }
}
