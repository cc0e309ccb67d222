use std::fmt;

use crate::metrics::{EvalMetrics, TrainMetrics};

/// Everything a training run reports while it's going.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    /// Periodic training progress.
    Progress {
        epoch: usize,
        batch: usize,
        /// Samples processed so far in this epoch, the current batch included.
        samples: usize,
        /// Samples in the whole epoch.
        total: usize,
        loss: f32,
    },
    EpochDone {
        epoch: usize,
        metrics: TrainMetrics,
    },
    Evaluated {
        epoch: usize,
        metrics: EvalMetrics,
    },
}

impl fmt::Display for TrainingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingEvent::Progress {
                epoch,
                samples,
                total,
                loss,
                ..
            } => write!(f, "Train Epoch {epoch} [{samples}/{total}] Loss: {loss:.4}"),
            TrainingEvent::EpochDone { epoch, metrics } => write!(
                f,
                "Epoch {epoch} done: {} batches, {} samples",
                metrics.batches, metrics.samples
            ),
            TrainingEvent::Evaluated { metrics, .. } => write!(f, "{metrics}"),
        }
    }
}
