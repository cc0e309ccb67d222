use std::fmt;

/// Counters of one training epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TrainMetrics {
    pub batches: u64,
    pub samples: u64,
    /// The loss of the last batch, `None` if the epoch had no batches.
    pub last_loss: Option<f32>,
}

impl TrainMetrics {
    #[inline]
    pub fn bump_batch(&mut self) {
        self.batches += 1;
    }

    #[inline]
    pub fn add_samples(&mut self, n: usize) {
        self.samples += n as u64;
    }
}

/// Aggregated results of one evaluation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EvalMetrics {
    /// Sum of the per-sample losses.
    pub total_loss: f64,
    pub correct: u64,
    pub samples: u64,
}

impl EvalMetrics {
    /// Returns the average per-sample loss, zero for an empty pass.
    pub fn mean_loss(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.total_loss / self.samples as f64
    }

    /// Returns the fraction of correct predictions, zero for an empty pass.
    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.correct as f64 / self.samples as f64
    }
}

impl fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Test set: Average loss: {:.4} | Accuracy: {:.3}",
            self.mean_loss(),
            self.accuracy()
        )
    }
}
