use std::{fmt, num::NonZeroUsize, thread};

use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{MlErr, Result};

/// What kind of compute a `Device` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// A pool with more than one worker thread.
    Parallel,
    /// A single worker thread.
    Cpu,
}

/// The compute device a model runs on.
///
/// Work submitted through `install` runs inside the device's thread pool, so every parallel
/// kernel a model uses is bounded by it.
pub struct Device {
    kind: DeviceKind,
    threads: usize,
    pool: ThreadPool,
}

impl Device {
    /// Picks the parallel device when more than one core is available, falling back to the
    /// single threaded one otherwise.
    pub fn detect() -> Result<Self> {
        let available = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        if available > 1 {
            match Self::with_threads(available) {
                Ok(device) => return Ok(device),
                Err(e) => warn!("failed to build a {available} thread pool, falling back to cpu: {e}"),
            }
        }

        Self::cpu()
    }

    /// The single threaded device.
    pub fn cpu() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Creates a device backed by exactly `threads` worker threads.
    ///
    /// # Returns
    /// An error if `threads` is zero or the pool can't be built.
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(MlErr::InvalidParameter {
                what: "threads",
                reason: "a device needs at least one thread".into(),
            });
        }

        let pool = Self::build(threads).map_err(|e| MlErr::Device(e.to_string()))?;
        let kind = if threads > 1 {
            DeviceKind::Parallel
        } else {
            DeviceKind::Cpu
        };

        debug!(threads = threads; "built {kind:?} device");
        Ok(Self {
            kind,
            threads,
            pool,
        })
    }

    fn build(threads: usize) -> std::result::Result<ThreadPool, rayon::ThreadPoolBuildError> {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("device-{i}"))
            .build()
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `op` inside this device's thread pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("kind", &self.kind)
            .field("threads", &self.threads)
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Parallel => write!(f, "parallel ({} threads)", self.threads),
            DeviceKind::Cpu => write!(f, "cpu"),
        }
    }
}
