use ndarray::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    Mode, Model, ParamMut, ParamRef, Parameters,
    layers::{Conv2d, Dropout, Dropout2d, Linear, LogSoftmax, MaxPool2d, Relu},
    param::scoped,
};
use crate::{MlErr, Result};

/// Amount of classes the network predicts.
pub const NUM_CLASSES: usize = 10;

/// Width of the flattened feature vector entering `fc1`; fixes the input at 28x28.
pub const FLAT_FEATURES: usize = 320;

const DROPOUT: f64 = 0.5;

/// The digit classifier:
///
/// ```text
/// conv1(1 -> 10, k5) -> max_pool(2) -> relu
/// conv2(10 -> 20, k5) -> dropout2d -> max_pool(2) -> relu
/// flatten(320) -> fc1(320 -> 50) -> relu -> dropout
/// fc2(50 -> 10) -> log_softmax
/// ```
#[derive(Debug, Clone)]
pub struct ConvNet {
    conv1: Conv2d,
    pool1: MaxPool2d,
    relu1: Relu<Ix4>,
    conv2: Conv2d,
    conv2_drop: Dropout2d,
    pool2: MaxPool2d,
    relu2: Relu<Ix4>,
    fc1: Linear,
    relu3: Relu<Ix2>,
    fc1_drop: Dropout,
    fc2: Linear,
    log_softmax: LogSoftmax,

    mode: Mode,
    grad_enabled: bool,
    rng: StdRng,
    flat_dim: (usize, usize, usize, usize),
}

impl ConvNet {
    /// Creates a new `ConvNet` in training mode with gradient tracking enabled.
    ///
    /// # Arguments
    /// * `rng` - Used to initialize the parameters and to seed the generator of dropout masks,
    ///   so the same seed always yields the same network and the same training run.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        let conv1 = Conv2d::new(1, 10, 5, rng)?;
        let conv2 = Conv2d::new(10, 20, 5, rng)?;
        let fc1 = Linear::new((FLAT_FEATURES, 50), rng)?;
        let fc2 = Linear::new((50, NUM_CLASSES), rng)?;

        Ok(Self {
            conv1,
            pool1: MaxPool2d::new(2),
            relu1: Relu::new(),
            conv2,
            conv2_drop: Dropout2d::new(DROPOUT)?,
            pool2: MaxPool2d::new(2),
            relu2: Relu::new(),
            fc1,
            relu3: Relu::new(),
            fc1_drop: Dropout::new(DROPOUT)?,
            fc2,
            log_softmax: LogSoftmax::new(),
            mode: Mode::Train,
            grad_enabled: true,
            rng: StdRng::seed_from_u64(rng.random()),
            flat_dim: (0, 0, 0, 0),
        })
    }

    fn run_layers(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        let track = self.grad_enabled;
        let mode = self.mode;

        let x = self.conv1.forward(x, track)?;
        let x = self.pool1.forward(x.view(), track)?;
        let x = self.relu1.forward(x, track);

        let x = self.conv2.forward(x.view(), track)?;
        let x = self.conv2_drop.forward(x, mode, track, &mut self.rng);
        let x = self.pool2.forward(x.view(), track)?;
        let x = self.relu2.forward(x, track);

        let (x, flat_dim) = flatten(x)?;
        self.flat_dim = flat_dim;

        let x = self.fc1.forward(x.view(), track)?;
        let x = self.relu3.forward(x, track);
        let x = self.fc1_drop.forward(x, mode, track, &mut self.rng);

        let x = self.fc2.forward(x.view(), track)?;
        Ok(self.log_softmax.forward(x, track))
    }

    fn clear_graph(&mut self) {
        self.conv1.clear_graph();
        self.pool1.clear_graph();
        self.relu1.clear_graph();
        self.conv2.clear_graph();
        self.conv2_drop.clear_graph();
        self.pool2.clear_graph();
        self.relu2.clear_graph();
        self.fc1.clear_graph();
        self.relu3.clear_graph();
        self.fc1_drop.clear_graph();
        self.fc2.clear_graph();
        self.log_softmax.clear_graph();
    }
}

impl Model for ConvNet {
    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        let out = self.run_layers(x);
        if out.is_err() {
            // Layers past the failure still hold the previous batch.
            self.clear_graph();
        }
        out
    }

    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()> {
        let d = self.log_softmax.backward(d)?;
        let d = self.fc2.backward(d.view())?;

        let d = self.fc1_drop.backward(d.view())?;
        let d = self.relu3.backward(d.view())?;
        let d = self.fc1.backward(d.view())?;

        let d = Array4::from_shape_vec(self.flat_dim, d.iter().copied().collect())?;
        let d = self.relu2.backward(d.view())?;
        let d = self.pool2.backward(d.view())?;
        let d = self.conv2_drop.backward(d.view())?;
        let d = self.conv2.backward(d.view())?;

        let d = self.relu1.backward(d.view())?;
        let d = self.pool1.backward(d.view())?;
        self.conv1.backward(d.view())?;

        Ok(())
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    fn set_grad_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.grad_enabled, enabled)
    }
}

impl Parameters for ConvNet {
    fn parameters(&self) -> Vec<ParamRef<'_>> {
        let mut params = scoped("conv1", self.conv1.parameters());
        params.extend(scoped("conv2", self.conv2.parameters()));
        params.extend(scoped("fc1", self.fc1.parameters()));
        params.extend(scoped("fc2", self.fc2.parameters()));
        params
    }

    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        let mut params = scoped("conv1", self.conv1.parameters_mut());
        params.extend(scoped("conv2", self.conv2.parameters_mut()));
        params.extend(scoped("fc1", self.fc1.parameters_mut()));
        params.extend(scoped("fc2", self.fc2.parameters_mut()));
        params
    }
}

/// Flattens `[n, c, h, w]` into `[n, c * h * w]`, which has to be exactly `FLAT_FEATURES` wide.
fn flatten(x: Array4<f32>) -> Result<(Array2<f32>, (usize, usize, usize, usize))> {
    let dim = x.dim();
    let (n, c, h, w) = dim;
    let features = c * h * w;
    if features != FLAT_FEATURES {
        return Err(MlErr::SizeMismatch {
            a: "flattened features",
            b: "fc1 inputs",
            got: features,
            expected: FLAT_FEATURES,
        });
    }

    let flat = Array2::from_shape_vec((n, features), x.iter().copied().collect())?;
    Ok((flat, dim))
}
