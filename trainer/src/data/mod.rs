mod dataloader;
mod dataset;
pub mod idx;

pub use dataloader::{Batch, Batches, DataLoader};
pub use dataset::{InMemoryDataset, Normalize, Split};
