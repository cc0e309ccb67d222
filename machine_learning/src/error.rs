use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidTarget {
        index: usize,
        label: usize,
        classes: usize,
    },
    NoGraph {
        layer: &'static str,
    },
    InvalidParameter {
        what: &'static str,
        reason: String,
    },
    Shape(ShapeError),
    Device(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlErr::InvalidTarget {
                index,
                label,
                classes,
            } => write!(
                f,
                "Target {index} has label {label} but the output only has {classes} classes"
            ),
            MlErr::NoGraph { layer } => write!(
                f,
                "Tried to backpropagate through {layer} without a recorded forward pass"
            ),
            MlErr::InvalidParameter { what, reason } => write!(f, "Invalid {what}: {reason}"),
            MlErr::Shape(e) => write!(f, "Shape error: {e}"),
            MlErr::Device(msg) => write!(f, "Device error: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<rand_distr::uniform::Error> for MlErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::InvalidParameter {
            what: "initialization range",
            reason: value.to_string(),
        }
    }
}
