use std::num::NonZeroUsize;

use machine_learning::{
    Device,
    arch::{ConvNet, Mode, Model, Parameters},
    optimization::{Optimizer, Sgd},
};
use ndarray::{Array1, Array4};
use rand::{SeedableRng, rngs::StdRng};
use trainer::{
    Driver, RunConfig, TrainErr, TrainingEvent,
    data::{DataLoader, InMemoryDataset},
    eval::evaluate,
    train::train_epoch,
};

fn synthetic(n: usize) -> InMemoryDataset {
    let labels = Array1::from_shape_fn(n, |i| (i * 7) % 10);
    let images = Array4::from_shape_fn((n, 1, 28, 28), |(s, _, i, j)| {
        let label = labels[s];
        let on = (i / 3 + j / 3 + label) % 4 == 0;
        if on { 2.0 } else { -0.4 }
    });
    InMemoryDataset::new(images, labels).unwrap()
}

fn config(batch_size: usize, test_batch_size: usize) -> RunConfig {
    RunConfig {
        batch_size,
        test_batch_size,
        epochs: 1,
        threads: Some(2),
        ..RunConfig::default()
    }
}

fn progress(events: &[TrainingEvent]) -> Vec<(usize, usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            TrainingEvent::Progress {
                batch,
                samples,
                total,
                ..
            } => Some((*batch, *samples, *total)),
            _ => None,
        })
        .collect()
}

fn params(model: &ConvNet) -> Vec<ndarray::ArrayD<f32>> {
    model
        .parameters()
        .into_iter()
        .map(|p| p.value.to_owned())
        .collect()
}

#[test]
fn one_epoch_of_ten_batches_reports_once() {
    let mut driver = Driver::from_parts(config(64, 100), synthetic(640), synthetic(100)).unwrap();

    let mut events = Vec::new();
    let history = driver.run(|e| events.push(e)).unwrap();

    assert_eq!(progress(&events), vec![(0, 64, 640)]);
    assert_eq!(driver.optimizer().steps(), 10);
    assert!(events.iter().any(|e| matches!(
        e,
        TrainingEvent::EpochDone { epoch: 1, metrics } if metrics.batches == 10 && metrics.samples == 640
    )));

    assert_eq!(history.len(), 1);
    let metrics = history[0];
    assert_eq!(metrics.samples, 100);
    assert!((0.0..=1.0).contains(&metrics.accuracy()));
    assert!(metrics.mean_loss() >= 0.0 && metrics.mean_loss().is_finite());
}

#[test]
fn a_single_sample_is_one_batch() {
    let mut driver = Driver::from_parts(config(64, 1000), synthetic(1), synthetic(1)).unwrap();

    let mut events = Vec::new();
    let history = driver.run(|e| events.push(e)).unwrap();

    assert_eq!(progress(&events), vec![(0, 1, 1)]);
    assert_eq!(driver.optimizer().steps(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        TrainingEvent::Progress { loss, .. } if loss.is_finite()
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        TrainingEvent::EpochDone { metrics, .. } if metrics.last_loss.is_some_and(f32::is_finite)
    )));

    let metrics = history[0];
    assert_eq!(metrics.samples, 1);
    assert!(metrics.accuracy() == 0.0 || metrics.accuracy() == 1.0);
}

#[test]
fn optimizer_steps_once_per_batch_across_epochs() {
    let config = RunConfig {
        epochs: 3,
        log_interval: 2,
        ..config(16, 50)
    };
    let mut driver = Driver::from_parts(config, synthetic(40), synthetic(10)).unwrap();

    let mut events = Vec::new();
    let history = driver.run(|e| events.push(e)).unwrap();

    // 16 + 16 + 8 per epoch, progress at batches 0 and 2.
    assert_eq!(driver.optimizer().steps(), 9);
    assert_eq!(history.len(), 3);
    assert_eq!(
        progress(&events),
        vec![(0, 16, 40), (2, 40, 40)].repeat(3)
    );
}

#[test]
fn non_finite_loss_aborts_before_any_update() {
    let mut train = synthetic(128);
    let mut images = train.images().clone();
    images[[0, 0, 14, 14]] = f32::NAN;
    train = InMemoryDataset::new(images, train.labels().clone()).unwrap();

    let config = config(64, 100);
    let mut driver = Driver::from_parts(config.clone(), train, synthetic(10)).unwrap();
    let fresh = ConvNet::new(&mut StdRng::seed_from_u64(config.seed)).unwrap();

    let mut events = Vec::new();
    let err = driver.run(|e| events.push(e)).unwrap_err();

    assert!(matches!(err, TrainErr::Diverged { epoch: 1, batch: 0, loss } if loss.is_nan()));
    assert!(events.is_empty());
    assert_eq!(driver.optimizer().steps(), 0);
    assert_eq!(params(driver.model()), params(&fresh));
}

#[test]
fn evaluation_is_repeatable_and_leaves_the_model_alone() {
    let mut model = ConvNet::new(&mut StdRng::seed_from_u64(11)).unwrap();
    let mut loader = DataLoader::new(synthetic(30), 8).unwrap();
    let device = Device::with_threads(2).unwrap();
    let before = params(&model);

    let a = evaluate(&mut model, &mut loader, &device).unwrap();
    let b = evaluate(&mut model, &mut loader, &device).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.samples, 30);
    assert_eq!(params(&model), before);
    assert_eq!(model.mode(), Mode::Eval);
    assert!(model.grad_enabled());
}

#[test]
fn empty_evaluation_set_reports_zeros() {
    let mut model = ConvNet::new(&mut StdRng::seed_from_u64(11)).unwrap();
    let mut loader = DataLoader::new(synthetic(0), 8).unwrap();
    let device = Device::cpu().unwrap();

    let metrics = evaluate(&mut model, &mut loader, &device).unwrap();
    assert_eq!(metrics.mean_loss(), 0.0);
    assert_eq!(metrics.accuracy(), 0.0);
}

#[test]
fn training_switches_back_to_train_mode() {
    let mut model = ConvNet::new(&mut StdRng::seed_from_u64(2)).unwrap();
    model.eval();
    let mut optimizer = Sgd::new(0.01, 0.5).unwrap();
    let mut loader = DataLoader::new(synthetic(8), 4).unwrap();
    let device = Device::cpu().unwrap();

    let metrics = train_epoch(
        &mut model,
        &mut optimizer,
        &mut loader,
        &device,
        1,
        NonZeroUsize::MIN,
        |_| {},
    )
    .unwrap();

    assert_eq!(model.mode(), Mode::Train);
    assert_eq!(metrics.batches, 2);
    assert!(metrics.last_loss.is_some_and(|l| l.is_finite() && l >= 0.0));
}

#[test]
fn results_do_not_depend_on_the_thread_count() {
    let run = |threads| {
        let config = RunConfig {
            threads: Some(threads),
            ..config(16, 50)
        };
        let mut driver = Driver::from_parts(config, synthetic(48), synthetic(20)).unwrap();
        let history = driver.run(|_| {}).unwrap();
        (params(driver.model()), history)
    };

    assert_eq!(run(1), run(3));
}

#[test]
fn shuffled_runs_are_reproducible() {
    let run = || {
        let config = RunConfig {
            shuffle: true,
            ..config(16, 50)
        };
        let mut driver = Driver::from_parts(config, synthetic(48), synthetic(20)).unwrap();
        driver.run(|_| {}).unwrap();
        params(driver.model())
    };

    assert_eq!(run(), run());
}
