use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use ndarray::{Array1, Array3};
use tempfile::TempDir;
use trainer::{
    Driver, RunConfig, TrainErr, TrainingEvent,
    data::{InMemoryDataset, Normalize, Split, idx},
};

fn write_split(dir: &Path, split: Split, count: usize) {
    let (images_file, labels_file) = split.files();
    let images = Array3::from_shape_fn((count, 28, 28), |(n, i, j)| ((n + i * j) % 256) as u8);
    let labels = Array1::from_shape_fn(count, |n| (n % 10) as u8);

    idx::write_images(&mut File::create(dir.join(images_file)).unwrap(), &images).unwrap();
    idx::write_labels(&mut File::create(dir.join(labels_file)).unwrap(), &labels).unwrap();
}

#[test]
fn loads_a_normalized_split() {
    let dir = TempDir::new().unwrap();
    write_split(dir.path(), Split::Test, 12);

    let norm = Normalize {
        mean: 0.1307,
        std: 0.3081,
    };
    let ds = InMemoryDataset::mnist(dir.path(), Split::Test, norm).unwrap();

    assert_eq!(ds.len(), 12);
    assert_eq!(ds.images().dim(), (12, 1, 28, 28));
    assert_eq!(ds.labels()[11], 1);
    assert!((ds.images()[[0, 0, 0, 0]] + 0.1307 / 0.3081).abs() < 1e-5);
}

#[test]
fn runs_end_to_end_from_idx_files() {
    let dir = TempDir::new().unwrap();
    write_split(dir.path(), Split::Train, 50);
    write_split(dir.path(), Split::Test, 20);

    let config = RunConfig {
        data_root: dir.path().to_path_buf(),
        batch_size: 25,
        test_batch_size: 8,
        epochs: 2,
        threads: Some(2),
        ..RunConfig::default()
    };

    let mut driver = Driver::setup(config).unwrap();
    let mut lines = Vec::new();
    let history = driver.run(|e| lines.push(e.to_string())).unwrap();

    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| m.samples == 20));
    assert!(lines[0].starts_with("Train Epoch 1 [25/50] Loss: "), "{}", lines[0]);
    assert!(lines.iter().any(|l| l.starts_with("Test set: Average loss: ")));
}

#[test]
fn mismatched_label_count_is_a_dataset_error() {
    let dir = TempDir::new().unwrap();
    write_split(dir.path(), Split::Train, 10);
    let (_, labels_file) = Split::Train.files();
    idx::write_labels(
        &mut File::create(dir.path().join(labels_file)).unwrap(),
        &Array1::zeros(9),
    )
    .unwrap();

    let norm = Normalize {
        mean: 0.0,
        std: 1.0,
    };
    match InMemoryDataset::mnist(dir.path(), Split::Train, norm) {
        Err(TrainErr::Dataset { path, source }) => {
            assert_eq!(path, dir.path().join(labels_file));
            assert_eq!(source.kind(), io::ErrorKind::InvalidData);
        }
        other => panic!("expected a dataset error, got {other:?}"),
    }
}

#[test]
fn oversized_header_is_a_dataset_error() {
    let dir = TempDir::new().unwrap();
    write_split(dir.path(), Split::Test, 2);
    let (images_file, _) = Split::Test.files();

    let mut bytes: Vec<u8> = [idx::IMAGES_MAGIC, u32::MAX, 28, 28]
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect();
    bytes.extend([0; 16]);
    std::fs::write(dir.path().join(images_file), bytes).unwrap();

    let norm = Normalize {
        mean: 0.0,
        std: 1.0,
    };
    match InMemoryDataset::mnist(dir.path(), Split::Test, norm) {
        Err(TrainErr::Dataset { path, source }) => {
            assert_eq!(path, dir.path().join(images_file));
            assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
        }
        other => panic!("expected a dataset error, got {other:?}"),
    }
}

#[test]
fn missing_data_root_fails_setup() {
    let config = RunConfig {
        data_root: PathBuf::from("/definitely/not/a/dataset"),
        ..RunConfig::default()
    };

    let err = Driver::setup(config).unwrap_err();
    assert!(matches!(err, TrainErr::Dataset { .. }));
    assert_eq!(io::Error::from(err).kind(), io::ErrorKind::NotFound);
}

#[test]
fn progress_counts_samples_including_the_current_batch() {
    let dir = TempDir::new().unwrap();
    write_split(dir.path(), Split::Train, 4);
    write_split(dir.path(), Split::Test, 4);

    let config = RunConfig {
        data_root: dir.path().to_path_buf(),
        batch_size: 2,
        epochs: 1,
        log_interval: 1,
        threads: Some(1),
        ..RunConfig::default()
    };

    let mut driver = Driver::setup(config).unwrap();
    let mut events = Vec::new();
    driver.run(|e| events.push(e)).unwrap();

    let samples: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TrainingEvent::Progress { samples, .. } => Some(*samples),
            _ => None,
        })
        .collect();
    assert_eq!(samples, vec![2, 4]);
    assert!(matches!(events.last(), Some(TrainingEvent::Evaluated { epoch: 1, .. })));
}
