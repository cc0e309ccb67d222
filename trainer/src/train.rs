use std::num::NonZeroUsize;

use log::debug;
use machine_learning::{
    Device,
    arch::{
        Model,
        loss::{LossFn, Nll},
    },
    optimization::Optimizer,
};

use crate::{
    Result, TrainErr,
    data::{Batch, DataLoader},
    event::TrainingEvent,
    metrics::TrainMetrics,
};

/// Runs one epoch of training over every batch of `loader`.
///
/// Per batch the gradients are reset, the mean negative log-likelihood of the batch is
/// backpropagated and the optimizer takes exactly one step. Every `log_interval` batches a
/// `TrainingEvent::Progress` is handed to `on_event`.
///
/// # Arguments
/// * `model` - The model to train, switched to training mode.
/// * `optimizer` - Updates the model's parameters.
/// * `loader` - The training batches.
/// * `device` - Where the per batch work runs.
/// * `epoch` - The 1-based epoch number, used for reporting.
/// * `log_interval` - How many batches between progress events.
/// * `on_event` - Receives the progress events.
///
/// # Returns
/// The epoch's counters, or the first error. A non-finite loss aborts with
/// `TrainErr::Diverged` before that batch is applied.
pub fn train_epoch<M, O, F>(
    model: &mut M,
    optimizer: &mut O,
    loader: &mut DataLoader,
    device: &Device,
    epoch: usize,
    log_interval: NonZeroUsize,
    mut on_event: F,
) -> Result<TrainMetrics>
where
    M: Model + Send,
    O: Optimizer + Send,
    F: FnMut(TrainingEvent),
{
    model.train();

    let nll = Nll::mean();
    let total = loader.len();
    let mut metrics = TrainMetrics::default();

    for (batch_idx, batch) in loader.iter().enumerate() {
        let loss = device.install(|| train_batch(model, optimizer, &nll, &batch, epoch, batch_idx))?;

        metrics.bump_batch();
        metrics.add_samples(batch.len());
        metrics.last_loss = Some(loss);
        debug!(epoch = epoch, batch = batch_idx, loss = loss; "trained batch");

        if batch_idx % log_interval.get() == 0 {
            on_event(TrainingEvent::Progress {
                epoch,
                batch: batch_idx,
                samples: metrics.samples as usize,
                total,
                loss,
            });
        }
    }

    Ok(metrics)
}

fn train_batch<M, O>(
    model: &mut M,
    optimizer: &mut O,
    nll: &Nll,
    batch: &Batch,
    epoch: usize,
    batch_idx: usize,
) -> Result<f32>
where
    M: Model,
    O: Optimizer,
{
    optimizer.zero_grad(model);

    let y_pred = model.forward(batch.inputs.view())?;
    let loss = nll.loss(y_pred.view(), batch.targets.view())?;
    if !loss.is_finite() {
        return Err(TrainErr::Diverged {
            epoch,
            batch: batch_idx,
            loss,
        });
    }

    let d = nll.loss_prime(y_pred.view(), batch.targets.view())?;
    model.backward(d.view())?;
    optimizer.step(model)?;

    Ok(loss)
}
