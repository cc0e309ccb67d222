use std::num::NonZeroUsize;

use ndarray::{Array1, Array4, Axis};
use rand::{rngs::StdRng, seq::SliceRandom};

use super::InMemoryDataset;
use crate::{Result, TrainErr};

/// A stacked batch of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch, channels, h, w]`
    pub inputs: Array4<f32>,
    /// `[batch]`
    pub targets: Array1<usize>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Splits a dataset into batches of `batch_size` samples, the last one may be smaller.
///
/// Every call to `iter` starts a new pass over the whole dataset. Samples come in dataset
/// order unless the loader was built with `shuffled`, in which case every pass draws a new
/// permutation from the loader's generator.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: InMemoryDataset,
    batch_size: NonZeroUsize,
    rng: Option<StdRng>,
}

impl DataLoader {
    /// Creates a new sequential `DataLoader`.
    ///
    /// # Returns
    /// An error if `batch_size` is zero.
    pub fn new(dataset: InMemoryDataset, batch_size: usize) -> Result<Self> {
        let batch_size = NonZeroUsize::new(batch_size)
            .ok_or_else(|| TrainErr::InvalidConfig("batch_size must be > 0".into()))?;

        Ok(Self {
            dataset,
            batch_size,
            rng: None,
        })
    }

    /// Makes every pass visit the samples in a random order drawn from `rng`.
    pub fn shuffled(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Returns the amount of samples in a pass.
    #[inline]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Returns the amount of batches in a pass.
    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size())
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&mut self) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if let Some(rng) = self.rng.as_mut() {
            order.shuffle(rng);
        }

        Batches {
            dataset: &self.dataset,
            order,
            batch_size: self.batch_size.get(),
            cursor: 0,
        }
    }
}

/// One pass over a `DataLoader`.
#[derive(Debug)]
pub struct Batches<'a> {
    dataset: &'a InMemoryDataset,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let idx = &self.order[self.cursor..end];
        self.cursor = end;

        Some(Batch {
            inputs: self.dataset.images().select(Axis(0), idx),
            targets: self.dataset.labels().select(Axis(0), idx),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn dataset(n: usize) -> InMemoryDataset {
        let images = Array4::from_shape_fn((n, 1, 2, 2), |(i, _, _, _)| i as f32);
        let labels = Array1::from_shape_fn(n, |i| i % 10);
        InMemoryDataset::new(images, labels).unwrap()
    }

    #[test]
    fn batches_respect_order_and_batch_size() {
        let mut dl = DataLoader::new(dataset(10), 4).unwrap();
        assert_eq!(dl.num_batches(), 3);

        let batches: Vec<_> = dl.iter().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[2].len(), 2);
        assert_eq!(batches[1].targets.to_vec(), vec![4, 5, 6, 7]);
        assert_eq!(batches[2].inputs[[1, 0, 1, 1]], 9.0);
    }

    #[test]
    fn every_pass_starts_over() {
        let mut dl = DataLoader::new(dataset(5), 2).unwrap();
        let first: Vec<_> = dl.iter().collect();
        let second: Vec<_> = dl.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn shuffled_passes_are_permutations() {
        let mut dl = DataLoader::new(dataset(20), 20)
            .unwrap()
            .shuffled(StdRng::seed_from_u64(7));

        let first_pixels = |batch: Batch| -> Vec<usize> {
            batch
                .inputs
                .outer_iter()
                .map(|sample| sample[[0, 0, 0]] as usize)
                .collect()
        };

        let a = first_pixels(dl.iter().next().unwrap());
        let b = first_pixels(dl.iter().next().unwrap());

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
        assert_ne!(a, (0..20).collect::<Vec<_>>());
        assert_ne!(a, b);
    }

    #[test]
    fn same_seed_same_order() {
        let order = |seed| {
            let mut dl = DataLoader::new(dataset(16), 16)
                .unwrap()
                .shuffled(StdRng::seed_from_u64(seed));
            dl.iter().next().unwrap().inputs
        };
        assert_eq!(order(3), order(3));
    }

    #[test]
    fn empty_dataset_yields_no_batches() {
        let mut dl = DataLoader::new(dataset(0), 8).unwrap();
        assert_eq!(dl.num_batches(), 0);
        assert_eq!(dl.iter().count(), 0);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            DataLoader::new(dataset(4), 0),
            Err(TrainErr::InvalidConfig(_))
        ));
    }
}
