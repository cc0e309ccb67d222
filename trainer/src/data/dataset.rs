use std::{
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use log::info;
use machine_learning::MlErr;
use ndarray::{Array1, Array3, Array4, Axis};

use super::idx;
use crate::{Result, TrainErr};

/// Which half of MNIST to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// The images and labels file names of this split.
    pub fn files(self) -> (&'static str, &'static str) {
        match self {
            Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }
}

/// Per pixel normalization, applied after scaling the raw bytes into `[0, 1]`:
/// `x = (byte / 255 - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub mean: f32,
    pub std: f32,
}

impl Normalize {
    fn apply(&self, raw: Array3<u8>) -> Array4<f32> {
        let Normalize { mean, std } = *self;
        raw.mapv(|b| (b as f32 / 255.0 - mean) / std)
            .insert_axis(Axis(1))
    }
}

/// A labeled image dataset held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    images: Array4<f32>,
    labels: Array1<usize>,
}

impl InMemoryDataset {
    /// Creates a new dataset from `[n, channels, h, w]` images and their `n` labels.
    ///
    /// # Returns
    /// An error if the amount of images and labels differ.
    pub fn new(images: Array4<f32>, labels: Array1<usize>) -> Result<Self> {
        if images.len_of(Axis(0)) != labels.len() {
            return Err(MlErr::SizeMismatch {
                a: "images",
                b: "labels",
                got: labels.len(),
                expected: images.len_of(Axis(0)),
            }
            .into());
        }

        Ok(Self { images, labels })
    }

    /// Loads one split of MNIST out of the IDX files in `root`.
    ///
    /// # Arguments
    /// * `root` - The directory holding the files.
    /// * `split` - Which split to load.
    /// * `normalize` - The normalization applied to every pixel.
    ///
    /// # Returns
    /// The dataset or a `TrainErr::Dataset` naming the offending file.
    pub fn mnist(root: &Path, split: Split, normalize: Normalize) -> Result<Self> {
        let (images_file, labels_file) = split.files();
        let images_path = root.join(images_file);
        let labels_path = root.join(labels_file);

        let images = read_with(&images_path, idx::read_images)?;
        let labels = read_with(&labels_path, idx::read_labels)?;

        if images.len_of(Axis(0)) != labels.len() {
            return Err(TrainErr::Dataset {
                path: labels_path,
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{} labels for {} images",
                        labels.len(),
                        images.len_of(Axis(0))
                    ),
                ),
            });
        }

        let (count, rows, cols) = images.dim();
        info!("loaded {split:?} split: {count} images of {rows}x{cols}");

        Self::new(normalize.apply(images), labels.mapv(usize::from))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn images(&self) -> &Array4<f32> {
        &self.images
    }

    pub fn labels(&self) -> &Array1<usize> {
        &self.labels
    }
}

fn read_with<T, F>(path: &Path, read: F) -> Result<T>
where
    F: FnOnce(&mut BufReader<File>) -> io::Result<T>,
{
    let dataset_err = |source| TrainErr::Dataset {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(dataset_err)?;
    read(&mut BufReader::new(file)).map_err(dataset_err)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn normalization_scales_then_standardizes() {
        let raw = array![[[0u8, 255], [51, 102]]];
        let norm = Normalize {
            mean: 0.5,
            std: 0.25,
        };

        let x = norm.apply(raw);
        assert_eq!(x.dim(), (1, 1, 2, 2));
        assert!((x[[0, 0, 0, 0]] + 2.0).abs() < 1e-6);
        assert!((x[[0, 0, 0, 1]] - 2.0).abs() < 1e-6);
        assert!((x[[0, 0, 1, 0]] + 1.2).abs() < 1e-5);
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let err = InMemoryDataset::new(Array4::zeros((3, 1, 2, 2)), array![0, 1]);
        assert!(matches!(
            err,
            Err(TrainErr::Ml(MlErr::SizeMismatch {
                got: 2,
                expected: 3,
                ..
            }))
        ));
    }

    #[test]
    fn missing_files_name_the_path() {
        let root = Path::new("/definitely/not/a/dataset");
        let norm = Normalize {
            mean: 0.0,
            std: 1.0,
        };

        match InMemoryDataset::mnist(root, Split::Test, norm) {
            Err(TrainErr::Dataset { path, source }) => {
                assert_eq!(path, root.join("t10k-images-idx3-ubyte"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected a dataset error, got {other:?}"),
        }
    }
}
