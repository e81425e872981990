// Workers - per-thread network copies and the containers they own
//
// Each worker holds a private copy of the master network and a contiguous
// slice of the corpus. Containers that fail to open or read are logged and
// skipped, and any frames they yielded before failing are rolled back. The
// epoch continues with the remaining containers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::gradient;
use crate::analysis::vector;
use crate::containers::FrameContainer;
use crate::error::{log_training_error, TrainingError};
use crate::network::MultiLayerPerceptron;

/// Split `items` into `parts` contiguous chunks whose sizes differ by at most one
///
/// The first `len % parts` chunks get the extra item.
pub fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let base = items.len() / parts;
    let extra = items.len() % parts;
    let mut chunks = Vec::with_capacity(parts);
    let mut iter = items.into_iter();
    for index in 0..parts {
        let size = base + usize::from(index < extra);
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

/// Whether a per-container failure may be skipped
fn is_container_failure(err: &TrainingError) -> bool {
    matches!(
        err,
        TrainingError::Pipeline(_) | TrainingError::DimensionMismatch { .. }
    )
}

/// Stream every frame of `container` through `visit`, closing it afterwards
fn drain<F>(container: &mut dyn FrameContainer, mut visit: F) -> Result<(), TrainingError>
where
    F: FnMut(&[f64], &[f64]) -> Result<(), TrainingError>,
{
    container.open()?;
    let result = visit_frames(container, &mut visit);
    container.close();
    result
}

fn visit_frames<F>(container: &mut dyn FrameContainer, visit: &mut F) -> Result<(), TrainingError>
where
    F: FnMut(&[f64], &[f64]) -> Result<(), TrainingError>,
{
    while container.has_next() {
        let frame = container.next()?;
        visit(frame.features(), frame.labels())?;
    }
    Ok(())
}

/// Accumulates delta weights over its containers
pub struct TrainWorker {
    pub(crate) network: MultiLayerPerceptron,
    containers: Vec<Box<dyn FrameContainer>>,
    processed: Arc<AtomicUsize>,
    examples: usize,
}

impl TrainWorker {
    pub fn new(network: MultiLayerPerceptron, containers: Vec<Box<dyn FrameContainer>>) -> Self {
        Self {
            network,
            containers,
            processed: Arc::new(AtomicUsize::new(0)),
            examples: 0,
        }
    }

    /// Shared counter of containers finished in the current epoch
    pub fn progress(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.processed)
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Examples that contributed to the last epoch
    pub fn examples(&self) -> usize {
        self.examples
    }

    /// One pass over every owned container
    ///
    /// On success the network's delta weights hold the average update per
    /// example seen by this worker.
    pub fn run_epoch(&mut self) -> Result<(), TrainingError> {
        self.processed.store(0, Ordering::Relaxed);
        self.examples = 0;

        let network = &mut self.network;
        let examples = &mut self.examples;
        for container in &mut self.containers {
            let saved_deltas = gradient::snapshot_delta_weights(network);
            let saved_examples = *examples;
            let result = drain(container.as_mut(), |features, labels| {
                network.evaluate_mode(features, true)?;
                gradient::backpropagate(network, labels)?;
                gradient::accumulate_delta_weights(network);
                *examples += 1;
                Ok(())
            });
            match result {
                Ok(()) => {}
                Err(err) if is_container_failure(&err) => {
                    gradient::restore_delta_weights(network, &saved_deltas);
                    *examples = saved_examples;
                    log_training_error(&err, &format!("training container {}", container.name()));
                }
                Err(err) => return Err(err),
            }
            self.processed.fetch_add(1, Ordering::Relaxed);
        }

        gradient::average_delta_weights(&mut self.network, self.examples);
        gradient::check_finite(&self.network)
    }
}

/// Sums squared residuals of a read-only network copy over its containers
pub struct TestWorker {
    pub(crate) network: MultiLayerPerceptron,
    containers: Vec<Box<dyn FrameContainer>>,
    processed: Arc<AtomicUsize>,
    squared_error: f64,
    trials: usize,
}

impl TestWorker {
    pub fn new(network: MultiLayerPerceptron, containers: Vec<Box<dyn FrameContainer>>) -> Self {
        Self {
            network,
            containers,
            processed: Arc::new(AtomicUsize::new(0)),
            squared_error: 0.0,
            trials: 0,
        }
    }

    pub fn progress(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.processed)
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Sum of `|target - output|^2` over the last run
    pub fn squared_error(&self) -> f64 {
        self.squared_error
    }

    /// Examples evaluated in the last run
    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn run(&mut self) -> Result<(), TrainingError> {
        self.processed.store(0, Ordering::Relaxed);
        self.squared_error = 0.0;
        self.trials = 0;

        let network = &mut self.network;
        let squared_error = &mut self.squared_error;
        let trials = &mut self.trials;
        for container in &mut self.containers {
            let saved = (*squared_error, *trials);
            let result = drain(container.as_mut(), |features, labels| {
                let outputs = network.evaluate(features)?;
                if outputs.len() != labels.len() {
                    return Err(TrainingError::DimensionMismatch {
                        what: "target",
                        expected: outputs.len(),
                        actual: labels.len(),
                    });
                }
                let residual = vector::sub(labels, &outputs);
                *squared_error += vector::dot(&residual, &residual);
                *trials += 1;
                Ok(())
            });
            match result {
                Ok(()) => {}
                Err(err) if is_container_failure(&err) => {
                    (*squared_error, *trials) = saved;
                    log_training_error(&err, &format!("testing container {}", container.name()));
                }
                Err(err) => return Err(err),
            }
            self.processed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}
