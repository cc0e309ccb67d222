mod convnet;
pub mod layers;
pub mod loss;
mod model;
mod no_grad;
mod param;

pub use convnet::ConvNet;
pub use model::{Mode, Model};
pub use no_grad::NoGrad;
pub use param::{Param, ParamMut, ParamRef, Parameters};
