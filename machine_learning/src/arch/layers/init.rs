use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::Result;

/// Samples an array from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
///
/// # Returns
/// An error if `fan_in` is zero.
pub(crate) fn uniform_fan_in<Sh, D, R>(shape: Sh, fan_in: usize, rng: &mut R) -> Result<Array<f32, D>>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng + ?Sized,
{
    let bound = 1.0 / (fan_in as f32).sqrt();
    let distribution = Uniform::new_inclusive(-bound, bound)?;
    Ok(Array::random_using(shape, distribution, rng))
}
