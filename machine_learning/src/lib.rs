pub mod arch;
pub mod device;
pub mod error;
pub mod optimization;

pub use device::{Device, DeviceKind};
pub use error::{MlErr, Result};
