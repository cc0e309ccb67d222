use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Result, TrainErr};

pub const DEFAULT_DATA_ROOT: &str = "./data";
pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_TEST_BATCH_SIZE: usize = 1000;
pub const DEFAULT_EPOCHS: usize = 10;
pub const DEFAULT_LOG_INTERVAL: usize = 10;
pub const DEFAULT_LEARNING_RATE: f32 = 0.01;
pub const DEFAULT_MOMENTUM: f32 = 0.5;
pub const DEFAULT_MEAN: f32 = 0.1307;
pub const DEFAULT_STD: f32 = 0.3081;
pub const DEFAULT_SEED: u64 = 1;

/// Everything a training run needs to know before building the model.
///
/// Deserializing fills the missing fields with their defaults, unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory holding the four IDX files.
    pub data_root: PathBuf,
    pub batch_size: usize,
    pub test_batch_size: usize,
    pub epochs: usize,
    /// Emit a progress event every `log_interval` batches.
    pub log_interval: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    pub mean: f32,
    pub std: f32,
    pub seed: u64,
    /// Shuffle the training set every epoch with a generator derived from `seed`.
    pub shuffle: bool,
    /// Amount of device threads, detected when absent.
    pub threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            batch_size: DEFAULT_BATCH_SIZE,
            test_batch_size: DEFAULT_TEST_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            log_interval: DEFAULT_LOG_INTERVAL,
            learning_rate: DEFAULT_LEARNING_RATE,
            momentum: DEFAULT_MOMENTUM,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            seed: DEFAULT_SEED,
            shuffle: false,
            threads: None,
        }
    }
}

impl RunConfig {
    /// Parses a `RunConfig` out of a json document.
    ///
    /// # Arguments
    /// * `json` - The document, every field is optional.
    ///
    /// # Returns
    /// The validated config or the reason it was rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the json config file at `path`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Checks every value is usable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("test_batch_size", self.test_batch_size),
            ("epochs", self.epochs),
            ("log_interval", self.log_interval),
        ];

        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(invalid(format!("{name} must be greater than zero")));
        }

        if self.threads == Some(0) {
            return Err(invalid("threads must be greater than zero".into()));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if !(0.0..1.0).contains(&self.momentum) {
            return Err(invalid(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }

        if !self.mean.is_finite() {
            return Err(invalid(format!("mean must be finite, got {}", self.mean)));
        }

        if !(self.std.is_finite() && self.std > 0.0) {
            return Err(invalid(format!("std must be positive, got {}", self.std)));
        }

        Ok(())
    }
}

fn invalid(msg: String) -> TrainErr {
    TrainErr::InvalidConfig(msg)
}
