use std::{error::Error, fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// The trainer module's result type.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Training run failures.
#[derive(Debug)]
pub enum TrainErr {
    Io(io::Error),
    /// A dataset file is missing, unreadable or malformed.
    Dataset {
        path: PathBuf,
        source: io::Error,
    },
    InvalidConfig(String),
    Config(serde_json::Error),
    /// The loss stopped being finite, the batch was never applied.
    Diverged {
        epoch: usize,
        batch: usize,
        loss: f32,
    },
    Ml(MlErr),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Io(e) => write!(f, "io error: {e}"),
            TrainErr::Dataset { path, source } => {
                write!(f, "dataset error at {}: {source}", path.display())
            }
            TrainErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            TrainErr::Config(e) => write!(f, "malformed config: {e}"),
            TrainErr::Diverged { epoch, batch, loss } => {
                write!(f, "training diverged at epoch {epoch}, batch {batch}: loss is {loss}")
            }
            TrainErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Io(e) => Some(e),
            TrainErr::Dataset { source, .. } => Some(source),
            TrainErr::Config(e) => Some(e),
            TrainErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TrainErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

impl From<MlErr> for TrainErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainErr> for io::Error {
    fn from(value: TrainErr) -> Self {
        match value {
            TrainErr::Io(e) => e,
            other => {
                let kind = match &other {
                    TrainErr::Dataset { source, .. } => source.kind(),
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
