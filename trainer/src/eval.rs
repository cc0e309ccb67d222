use log::{debug, warn};
use machine_learning::{
    Device,
    arch::{
        Model, NoGrad,
        loss::{LossFn, Nll},
    },
};
use ndarray::{ArrayView1, Axis};

use crate::{Result, data::DataLoader, metrics::EvalMetrics};

/// Runs the model over every batch of `loader` in evaluation mode with gradient tracking
/// suspended, accumulating the summed negative log-likelihood and the amount of correct
/// predictions.
///
/// Parameters are never touched, so running it twice over the same loader gives the same
/// metrics.
pub fn evaluate<M>(model: &mut M, loader: &mut DataLoader, device: &Device) -> Result<EvalMetrics>
where
    M: Model + Send,
{
    model.eval();
    let mut model = NoGrad::new(model);

    let nll = Nll::sum();
    let mut metrics = EvalMetrics::default();

    for batch in loader.iter() {
        let model = &mut *model;
        let (loss, correct) = device.install(|| -> Result<(f32, u64)> {
            let y_pred = model.forward(batch.inputs.view())?;
            let loss = nll.loss(y_pred.view(), batch.targets.view())?;
            let correct = y_pred
                .axis_iter(Axis(0))
                .zip(&batch.targets)
                .filter(|(row, label)| argmax(*row) == **label)
                .count();

            Ok((loss, correct as u64))
        })?;

        metrics.total_loss += loss as f64;
        metrics.correct += correct;
        metrics.samples += batch.len() as u64;
    }

    if metrics.samples == 0 {
        warn!("evaluation set is empty, reporting zeroed metrics");
    }

    debug!(samples = metrics.samples, correct = metrics.correct; "evaluation done");
    Ok(metrics)
}

/// Index of the first maximum of `row`.
fn argmax(row: ArrayView1<f32>) -> usize {
    row.indexed_iter()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}
