pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod eval;
pub mod event;
pub mod metrics;
pub mod train;

pub use config::RunConfig;
pub use driver::Driver;
pub use error::{Result, TrainErr};
pub use event::TrainingEvent;
