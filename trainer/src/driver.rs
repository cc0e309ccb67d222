use std::num::NonZeroUsize;

use log::info;
use machine_learning::{
    Device,
    arch::{ConvNet, Parameters},
    optimization::{Optimizer, Sgd},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Result, RunConfig, TrainErr,
    data::{DataLoader, InMemoryDataset, Normalize, Split},
    eval::evaluate,
    event::TrainingEvent,
    metrics::EvalMetrics,
    train::train_epoch,
};

/// Owns everything a training run needs and drives its epochs.
#[derive(Debug)]
pub struct Driver {
    config: RunConfig,
    device: Device,
    model: ConvNet,
    optimizer: Sgd,
    train_loader: DataLoader,
    test_loader: DataLoader,
}

impl Driver {
    /// Validates `config`, loads both MNIST splits out of `config.data_root` and builds the run.
    pub fn setup(config: RunConfig) -> Result<Self> {
        config.validate()?;

        let normalize = Normalize {
            mean: config.mean,
            std: config.std,
        };
        let train = InMemoryDataset::mnist(&config.data_root, Split::Train, normalize)?;
        let test = InMemoryDataset::mnist(&config.data_root, Split::Test, normalize)?;

        Self::from_parts(config, train, test)
    }

    /// Builds the run over already loaded datasets.
    ///
    /// A single generator seeded with `config.seed` initializes the model first and then seeds
    /// the training shuffle, if enabled, so equal configs give equal runs.
    ///
    /// # Arguments
    /// * `config` - The run's configuration, `data_root` is ignored.
    /// * `train` - The training dataset.
    /// * `test` - The evaluation dataset.
    pub fn from_parts(
        config: RunConfig,
        train: InMemoryDataset,
        test: InMemoryDataset,
    ) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);

        let device = match config.threads {
            Some(threads) => Device::with_threads(threads)?,
            None => Device::detect()?,
        };
        info!("using device: {device}");

        let model = ConvNet::new(&mut rng)?;
        info!("built model with {} parameters", model.size());

        let optimizer = Sgd::new(config.learning_rate, config.momentum)?;

        let mut train_loader = DataLoader::new(train, config.batch_size)?;
        if config.shuffle {
            train_loader = train_loader.shuffled(StdRng::seed_from_u64(rng.random()));
        }
        let test_loader = DataLoader::new(test, config.test_batch_size)?;

        Ok(Self {
            config,
            device,
            model,
            optimizer,
            train_loader,
            test_loader,
        })
    }

    /// Runs every epoch, training then evaluating.
    ///
    /// # Arguments
    /// * `on_event` - Receives every progress, epoch and evaluation event as it happens.
    ///
    /// # Returns
    /// The evaluation metrics of every epoch, or the first error.
    pub fn run<F>(&mut self, mut on_event: F) -> Result<Vec<EvalMetrics>>
    where
        F: FnMut(TrainingEvent),
    {
        let log_interval = NonZeroUsize::new(self.config.log_interval)
            .ok_or_else(|| TrainErr::InvalidConfig("log_interval must be > 0".into()))?;

        let mut history = Vec::with_capacity(self.config.epochs);
        for epoch in 1..=self.config.epochs {
            info!(
                "starting epoch {epoch}/{}: {} batches",
                self.config.epochs,
                self.train_loader.num_batches()
            );

            let metrics = train_epoch(
                &mut self.model,
                &mut self.optimizer,
                &mut self.train_loader,
                &self.device,
                epoch,
                log_interval,
                &mut on_event,
            )?;
            on_event(TrainingEvent::EpochDone { epoch, metrics });

            let metrics = evaluate(&mut self.model, &mut self.test_loader, &self.device)?;
            on_event(TrainingEvent::Evaluated { epoch, metrics });
            history.push(metrics);
        }

        info!("training finished after {} steps", self.optimizer.steps());
        Ok(history)
    }

    pub fn model(&self) -> &ConvNet {
        &self.model
    }

    pub fn optimizer(&self) -> &Sgd {
        &self.optimizer
    }
}
