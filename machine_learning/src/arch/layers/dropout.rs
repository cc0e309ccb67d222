use ndarray::prelude::*;
use rand::Rng;

use crate::{MlErr, Result, arch::Mode};

/// Zeroes every activation with probability `p` in training mode and scales the survivors by
/// `1 / (1 - p)`. It's the identity in evaluation mode.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f64,
    mask: Option<Array2<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout`.
    ///
    /// # Returns
    /// An error if `p` isn't in `[0, 1)`.
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p, mask: None })
    }

    pub(crate) fn clear_graph(&mut self) {
        self.mask = None;
    }

    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        x: Array2<f32>,
        mode: Mode,
        tracking: bool,
        rng: &mut R,
    ) -> Array2<f32> {
        if mode == Mode::Eval || self.p == 0.0 {
            self.mask = tracking.then(|| Array2::ones(x.raw_dim()));
            return x;
        }

        let scale = keep_scale(self.p);
        let mask = x.map(|_| if rng.random_bool(self.p) { 0.0 } else { scale });
        let y = x * &mask;

        self.mask = tracking.then_some(mask);
        y
    }

    pub fn backward(&mut self, d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mask = self.mask.take().ok_or(MlErr::NoGraph { layer: "dropout" })?;
        Ok(&d * &mask)
    }
}

/// Spatial dropout: zeroes whole channels of a `[n, c, h, w]` batch with probability `p` in
/// training mode, scaling the kept ones by `1 / (1 - p)`. It's the identity in evaluation mode.
#[derive(Debug, Clone)]
pub struct Dropout2d {
    p: f64,
    mask: Option<Array4<f32>>,
}

impl Dropout2d {
    /// Creates a new `Dropout2d`.
    ///
    /// # Returns
    /// An error if `p` isn't in `[0, 1)`.
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p, mask: None })
    }

    pub(crate) fn clear_graph(&mut self) {
        self.mask = None;
    }

    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        x: Array4<f32>,
        mode: Mode,
        tracking: bool,
        rng: &mut R,
    ) -> Array4<f32> {
        let (n, c, _, _) = x.dim();
        if mode == Mode::Eval || self.p == 0.0 {
            self.mask = tracking.then(|| Array4::ones((n, c, 1, 1)));
            return x;
        }

        let scale = keep_scale(self.p);
        let mask = Array4::from_shape_fn((n, c, 1, 1), |_| {
            if rng.random_bool(self.p) { 0.0 } else { scale }
        });
        let y = x * &mask;

        self.mask = tracking.then_some(mask);
        y
    }

    pub fn backward(&mut self, d: ArrayView4<f32>) -> Result<Array4<f32>> {
        let mask = self.mask.take().ok_or(MlErr::NoGraph { layer: "dropout2d" })?;
        Ok(&d * &mask)
    }
}

fn check_probability(p: f64) -> Result<()> {
    if !(0.0..1.0).contains(&p) {
        return Err(MlErr::InvalidParameter {
            what: "dropout probability",
            reason: format!("{p} is not in [0, 1)"),
        });
    }

    Ok(())
}

fn keep_scale(p: f64) -> f32 {
    (1.0 / (1.0 - p)) as f32
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn eval_mode_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::from_elem((8, 50), 1.5);

        let mut dropout = Dropout::new(0.5).unwrap();
        let y = dropout.forward(x.clone(), Mode::Eval, false, &mut rng);
        assert_eq!(y, x);

        let x = Array4::from_elem((4, 20, 8, 8), 1.5);
        let mut dropout = Dropout2d::new(0.5).unwrap();
        let y = dropout.forward(x.clone(), Mode::Eval, false, &mut rng);
        assert_eq!(y, x);
    }

    #[test]
    fn eval_mode_consumes_no_randomness() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut dropout = Dropout::new(0.5).unwrap();
        dropout.forward(Array2::ones((4, 4)), Mode::Eval, false, &mut rng);

        let mut fresh = StdRng::seed_from_u64(0);
        assert_eq!(rng.random::<u64>(), fresh.random::<u64>());
    }

    #[test]
    fn train_mode_zeroes_and_rescales() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut dropout = Dropout::new(0.5).unwrap();
        let y = dropout.forward(Array2::ones((16, 50)), Mode::Train, true, &mut rng);

        let zeroed = y.iter().filter(|&&v| v == 0.0).count();
        assert!(zeroed > 0 && zeroed < y.len());
        assert!(y.iter().all(|&v| v == 0.0 || v == 2.0));

        let dx = dropout.backward(Array2::ones((16, 50)).view()).unwrap();
        assert_eq!(dx, y);
    }

    #[test]
    fn spatial_dropout_drops_whole_channels() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut dropout = Dropout2d::new(0.5).unwrap();
        let y = dropout.forward(Array4::ones((8, 20, 4, 4)), Mode::Train, false, &mut rng);

        let mut dropped = 0;
        for b in 0..8usize {
            for ch in 0..20usize {
                let channel = y.slice(s![b, ch, .., ..]);
                let first = channel[[0, 0]];
                assert!(channel.iter().all(|&v| v == first));
                if first == 0.0 {
                    dropped += 1;
                }
            }
        }
        assert!(dropped > 0 && dropped < 8 * 20);
    }

    #[test]
    fn invalid_probability_is_rejected() {
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout2d::new(-0.1).is_err());
    }
}
