mod conv2d;
mod dropout;
mod init;
mod linear;
mod log_softmax;
mod max_pool;
mod relu;

pub use conv2d::Conv2d;
pub use dropout::{Dropout, Dropout2d};
pub use linear::Linear;
pub use log_softmax::LogSoftmax;
pub use max_pool::MaxPool2d;
pub use relu::Relu;
