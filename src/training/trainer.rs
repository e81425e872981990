// BackpropTrainer - data-parallel backpropagation over labeled containers
//
// Each epoch runs one scoped thread per `TrainWorker`; the coordinating
// thread polls for completion with a linear backoff, reporting progress as
// it goes. Once every worker has finished, the per-worker average delta
// weights are merged into the master network and the master weights are
// copied back out. The test set is then evaluated the same way by
// `TestWorker`s holding read-only copies of the master.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::gradient;
use super::progress::{TrainingEvent, TrainingObserver, TrainingSummary};
use super::state::{StopReason, TrainingState};
use super::worker::{partition, TestWorker, TrainWorker};
use crate::config::TrainingConfig;
use crate::containers::FrameContainer;
use crate::error::{log_training_error, TrainingError};
use crate::network::MultiLayerPerceptron;

/// Split `containers` into (training, testing) by `training_fraction`
///
/// The training share is `floor(fraction * len)`, clamped so that both
/// halves are non-empty whenever there are at least two containers.
pub fn split_corpus<T>(mut containers: Vec<T>, training_fraction: f64) -> (Vec<T>, Vec<T>) {
    let len = containers.len();
    let mut training = (training_fraction.clamp(0.0, 1.0) * len as f64).floor() as usize;
    if len >= 2 {
        training = training.clamp(1, len - 1);
    }
    let testing = containers.split_off(training.min(len));
    (containers, testing)
}

/// Number of worker threads for `containers` containers
pub fn worker_count(config: &TrainingConfig, containers: usize) -> usize {
    let cpus = thread::available_parallelism().map_or(1, |n| n.get());
    cpus.min(config.max_threads).min(containers).max(1)
}

pub struct BackpropTrainer {
    network: MultiLayerPerceptron,
    config: TrainingConfig,
    observer: Option<Box<dyn TrainingObserver>>,
}

impl BackpropTrainer {
    /// Create a trainer around the master network
    ///
    /// # Arguments
    /// * `network` - Master network; its weights are updated in place
    /// * `config` - Convergence and scheduling parameters
    pub fn new(network: MultiLayerPerceptron, config: TrainingConfig) -> Self {
        Self {
            network,
            config,
            observer: None,
        }
    }

    /// Attach an observer for progress events
    pub fn with_observer<O: TrainingObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn network(&self) -> &MultiLayerPerceptron {
        &self.network
    }

    pub fn into_network(self) -> MultiLayerPerceptron {
        self.network
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn emit(&mut self, event: TrainingEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
    }

    /// Size the master network from the first readable training example
    ///
    /// Containers that cannot be opened or read, or that hold no frames, are
    /// logged and passed over.
    ///
    /// # Errors
    /// * `EmptyDataset` - no container yields a frame
    /// * `DimensionMismatch` - the first readable example does not fit the network
    pub fn prepare_network(&mut self, containers: &mut [Box<dyn FrameContainer>]) -> Result<(), TrainingError> {
        for container in containers.iter_mut() {
            let container = container.as_mut();
            let result = container
                .open()
                .map_err(TrainingError::from)
                .and_then(|()| self.size_from_first_frame(&mut *container));
            container.close();
            match result {
                Ok(true) => return Ok(()),
                Ok(false) => log_training_error(
                    &TrainingError::EmptyDataset { which: "training" },
                    &format!("sizing from {}", container.name()),
                ),
                Err(err @ TrainingError::Pipeline(_)) => {
                    log_training_error(&err, &format!("sizing from {}", container.name()))
                }
                Err(err) => return Err(err),
            }
        }
        Err(TrainingError::EmptyDataset { which: "training" })
    }

    /// Returns false when the container holds no frames
    fn size_from_first_frame(&mut self, container: &mut dyn FrameContainer) -> Result<bool, TrainingError> {
        if !container.has_next() {
            return Ok(false);
        }
        let frame = container.next()?;
        self.network.evaluate_mode(frame.features(), true)?;
        if frame.labels().len() != self.network.output_len() {
            return Err(TrainingError::DimensionMismatch {
                what: "target",
                expected: self.network.output_len(),
                actual: frame.labels().len(),
            });
        }
        tracing::info!(
            "[BackpropTrainer] Network sized for {} features from {}",
            frame.features().len(),
            container.name()
        );
        Ok(true)
    }

    /// Train until the test error stops changing or the epoch cap is hit
    ///
    /// # Arguments
    /// * `training` - Containers used to compute weight updates
    /// * `testing` - Containers used to measure the mean squared error
    ///
    /// # Returns
    /// Summary of the run; the trained weights stay in [`Self::network`].
    pub fn train(
        &mut self,
        mut training: Vec<Box<dyn FrameContainer>>,
        testing: Vec<Box<dyn FrameContainer>>,
    ) -> Result<TrainingSummary, TrainingError> {
        let started = Instant::now();
        if training.is_empty() {
            return Err(TrainingError::EmptyDataset { which: "training" });
        }
        if testing.is_empty() {
            return Err(TrainingError::EmptyDataset { which: "testing" });
        }
        self.prepare_network(&mut training)?;
        self.network.zero_delta_weights();

        let threads = worker_count(&self.config, training.len());
        let train_total = training.len();
        let test_total = testing.len();
        tracing::info!(
            "[BackpropTrainer] Training on {} containers, testing on {}, {} threads",
            train_total,
            test_total,
            threads
        );

        let mut train_workers: Vec<TrainWorker> = partition(training, threads)
            .into_iter()
            .map(|chunk| TrainWorker::new(self.network.clone(), chunk))
            .collect();
        let test_threads = worker_count(&self.config, test_total);
        let mut test_workers: Vec<TestWorker> = partition(testing, test_threads)
            .into_iter()
            .map(|chunk| TestWorker::new(self.network.clone(), chunk))
            .collect();

        let initial_error = self.evaluate(&mut test_workers, test_total)?;
        let mut state = TrainingState::new(initial_error);
        tracing::info!("[BackpropTrainer] Initial error: {:.6}", initial_error);
        self.emit(TrainingEvent::EpochFinished {
            epoch: 0,
            error: initial_error,
            delta: 0.0,
        });

        let reason = loop {
            if let Some(reason) = state.stop_reason(&self.config) {
                break reason;
            }
            let epoch = state.epoch + 1;
            self.emit(TrainingEvent::EpochStarted { epoch });

            self.run_pool(&mut train_workers, train_total, TrainWorker::run_epoch, |processed, total| {
                TrainingEvent::Progress { processed, total }
            })?;
            let examples: usize = train_workers.iter().map(TrainWorker::examples).sum();
            if examples == 0 {
                return Err(TrainingError::EmptyDataset { which: "training" });
            }

            let rate = state.learning_rate(&self.config);
            {
                let mut networks: Vec<&mut MultiLayerPerceptron> =
                    train_workers.iter_mut().map(|worker| &mut worker.network).collect();
                gradient::aggregate(&mut self.network, &mut networks, rate)?;
            }

            let error = self.evaluate(&mut test_workers, test_total)?;
            state.record(error);
            tracing::debug!(
                "[BackpropTrainer] Epoch {}: error {:.6} (delta {:+.6}, rate {:.4}, {} examples)",
                state.epoch,
                error,
                state.delta(),
                rate,
                examples
            );
            self.emit(TrainingEvent::EpochFinished {
                epoch: state.epoch,
                error,
                delta: state.delta(),
            });
        };

        let converged = reason == StopReason::Converged;
        match reason {
            StopReason::Converged => tracing::info!(
                "[BackpropTrainer] Converged after {} epochs, error {:.6}",
                state.epoch,
                state.error
            ),
            StopReason::EpochLimit => tracing::warn!(
                "[BackpropTrainer] Stopped at the {}-epoch limit without converging, error {:.6}",
                state.epoch,
                state.error
            ),
        }

        let summary = TrainingSummary {
            epochs: state.epoch,
            final_error: state.error,
            converged,
            elapsed: started.elapsed(),
        };
        self.emit(TrainingEvent::Finished(summary.clone()));
        Ok(summary)
    }

    /// Mean squared error of the master network over the test workers
    fn evaluate(&mut self, workers: &mut [TestWorker], total: usize) -> Result<f64, TrainingError> {
        for worker in workers.iter_mut() {
            worker.network.copy_weights_from(&self.network);
        }
        self.run_pool(workers, total, TestWorker::run, |processed, total| {
            TrainingEvent::Testing { processed, total }
        })?;

        let trials: usize = workers.iter().map(TestWorker::trials).sum();
        if trials == 0 {
            return Err(TrainingError::EmptyDataset { which: "testing" });
        }
        let squared: f64 = workers.iter().map(TestWorker::squared_error).sum();
        let error = squared / (trials * self.network.output_len()) as f64;
        if !error.is_finite() {
            return Err(TrainingError::NumericAnomaly {
                layer: self.network.len().saturating_sub(1),
                node: 0,
                quantity: "test error",
            });
        }
        Ok(error)
    }

    /// Run `job` on every worker in its own scoped thread and wait for all
    ///
    /// Completion is polled with a backoff that restarts whenever another
    /// worker finishes. The first worker error (or panic) is returned once
    /// every thread has been joined.
    fn run_pool<W, J, P>(
        &mut self,
        workers: &mut [W],
        total: usize,
        job: J,
        progress: P,
    ) -> Result<(), TrainingError>
    where
        W: PoolWorker,
        J: Fn(&mut W) -> Result<(), TrainingError> + Sync,
        P: Fn(usize, usize) -> TrainingEvent,
    {
        let counters: Vec<Arc<AtomicUsize>> = workers.iter().map(PoolWorker::counter).collect();
        let processed = || counters.iter().map(|c| c.load(Ordering::Relaxed)).sum::<usize>();
        let start = self.config.poll_start_ms;
        let step = self.config.poll_step_ms;
        let cap = self.config.poll_max_ms.max(start);
        let job = &job;

        thread::scope(|scope| {
            let handles: Vec<_> = workers
                .iter_mut()
                .map(|worker| scope.spawn(move || job(worker)))
                .collect();

            let mut sleep_ms = start;
            let mut finished = 0;
            loop {
                let done = handles.iter().filter(|handle| handle.is_finished()).count();
                self.emit(progress(processed(), total));
                if done == handles.len() {
                    break;
                }
                if done > finished {
                    finished = done;
                    sleep_ms = start;
                } else {
                    sleep_ms = (sleep_ms + step).min(cap);
                }
                thread::sleep(Duration::from_millis(sleep_ms));
            }

            let mut first_error = None;
            for (index, handle) in handles.into_iter().enumerate() {
                let outcome = match handle.join() {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!("[BackpropTrainer] Worker {} panicked", index);
                        Err(TrainingError::WorkerPanicked { worker: index })
                    }
                };
                if let Err(err) = outcome {
                    first_error.get_or_insert(err);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

/// Worker that reports container progress through a shared counter
pub(crate) trait PoolWorker: Send {
    fn counter(&self) -> Arc<AtomicUsize>;
}

impl PoolWorker for TrainWorker {
    fn counter(&self) -> Arc<AtomicUsize> {
        self.progress()
    }
}

impl PoolWorker for TestWorker {
    fn counter(&self) -> Arc<AtomicUsize> {
        self.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::FeatureFrame;
    use crate::containers::MemoryFrameContainer;
    use crate::error::PipelineError;
    use crate::network::{Activation, Layer};
    use std::sync::Mutex;

    struct BrokenContainer;

    impl FrameContainer for BrokenContainer {
        fn name(&self) -> String {
            "broken".to_string()
        }
        fn open(&mut self) -> Result<(), PipelineError> {
            Err(PipelineError::unavailable("broken", "missing"))
        }
        fn has_next(&self) -> bool {
            false
        }
        fn next(&mut self) -> Result<FeatureFrame, PipelineError> {
            Err(PipelineError::NotOpen)
        }
        fn close(&mut self) {}
    }

    fn example(name: &str, features: Vec<f64>, label: f64) -> Box<dyn FrameContainer> {
        Box::new(MemoryFrameContainer::new(
            name,
            vec![FeatureFrame::new(features, vec![label])],
        ))
    }

    fn separable_corpus() -> Vec<Box<dyn FrameContainer>> {
        vec![
            example("vocal", vec![4.0, 0.0], 1.0),
            example("instrumental", vec![0.0, 4.0], 0.0),
        ]
    }

    fn output_only_network() -> MultiLayerPerceptron {
        let mut network = MultiLayerPerceptron::new(0.2, 0.8, Some(42));
        network.append(Layer::new(1, Activation::softmax(1.0)).unwrap());
        network
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            max_epochs: 500,
            min_delta_error: 1e-6,
            poll_start_ms: 1,
            poll_step_ms: 1,
            poll_max_ms: 5,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_split_corpus() {
        let (training, testing) = split_corpus((0..8).collect::<Vec<_>>(), 0.75);
        assert_eq!(training, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(testing, vec![6, 7]);

        let (training, testing) = split_corpus(vec![1, 2], 0.75);
        assert_eq!((training.len(), testing.len()), (1, 1));

        let (training, testing) = split_corpus(vec![1], 0.75);
        assert_eq!((training.len(), testing.len()), (0, 1));
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let config = TrainingConfig {
            max_threads: 3,
            ..TrainingConfig::default()
        };
        assert_eq!(worker_count(&config, 1), 1);
        assert!(worker_count(&config, 10) <= 3);
        assert_eq!(worker_count(&config, 0), 1);
    }

    #[test]
    fn test_learns_separable_examples() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut trainer = BackpropTrainer::new(output_only_network(), config())
            .with_observer(move |event: &TrainingEvent| {
                if let Ok(mut events) = sink.lock() {
                    events.push(event.clone());
                }
            });

        let summary = trainer.train(separable_corpus(), separable_corpus()).unwrap();

        assert!(summary.final_error < 0.05, "error {}", summary.final_error);
        assert!(summary.epochs > 0);

        let network = trainer.network();
        assert!(network.weights(0, 0).unwrap()[0] > 0.8);
        assert!(network.weights(0, 0).unwrap()[1] < 0.2);

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(TrainingEvent::Testing { .. })));
        assert!(matches!(events.last(), Some(TrainingEvent::Finished(_))));
        assert!(events
            .iter()
            .any(|event| matches!(event, TrainingEvent::EpochFinished { epoch: 0, .. })));
    }

    #[test]
    fn test_error_decreases_from_initial() {
        let mut errors = Vec::new();
        let (tx, rx) = std::sync::mpsc::channel();
        let mut trainer = BackpropTrainer::new(
            output_only_network(),
            TrainingConfig {
                max_epochs: 20,
                ..config()
            },
        )
        .with_observer(move |event: &TrainingEvent| {
            if let TrainingEvent::EpochFinished { error, .. } = event {
                let _ = tx.send(*error);
            }
        });

        let summary = trainer.train(separable_corpus(), separable_corpus()).unwrap();
        errors.extend(rx.try_iter());

        assert_eq!(errors.len(), summary.epochs + 1);
        assert!(errors.last().unwrap() < errors.first().unwrap());
        assert!(!summary.converged);
        assert_eq!(summary.epochs, 20);
    }

    #[test]
    fn test_empty_sets_are_rejected() {
        let mut trainer = BackpropTrainer::new(output_only_network(), config());
        assert_eq!(
            trainer.train(Vec::new(), separable_corpus()),
            Err(TrainingError::EmptyDataset { which: "training" })
        );
        assert_eq!(
            trainer.train(separable_corpus(), Vec::new()),
            Err(TrainingError::EmptyDataset { which: "testing" })
        );
    }

    #[test]
    fn test_prepare_rejects_corpus_without_frames() {
        let mut trainer = BackpropTrainer::new(output_only_network(), config());
        let mut training: Vec<Box<dyn FrameContainer>> = vec![
            Box::new(MemoryFrameContainer::new("empty", Vec::new())),
            Box::new(BrokenContainer),
        ];
        assert_eq!(
            trainer.prepare_network(&mut training),
            Err(TrainingError::EmptyDataset { which: "training" })
        );
    }

    #[test]
    fn test_prepare_skips_unusable_leading_containers() {
        let mut trainer = BackpropTrainer::new(output_only_network(), config());
        let mut training: Vec<Box<dyn FrameContainer>> = vec![
            Box::new(BrokenContainer),
            Box::new(MemoryFrameContainer::new("empty", Vec::new())),
            example("good", vec![1.0, 2.0, 3.0, 4.0], 1.0),
        ];
        trainer.prepare_network(&mut training).unwrap();
        assert_eq!(trainer.network().input_len(), Some(4));
    }

    #[test]
    fn test_train_survives_broken_first_container() {
        let mut training = vec![Box::new(BrokenContainer) as Box<dyn FrameContainer>];
        training.extend(separable_corpus());
        let mut trainer = BackpropTrainer::new(
            output_only_network(),
            TrainingConfig {
                max_epochs: 2,
                ..config()
            },
        );

        let summary = trainer.train(training, separable_corpus()).unwrap();

        assert_eq!(summary.epochs, 2);
        assert_eq!(trainer.network().input_len(), Some(2));
    }

    #[test]
    fn test_prepare_rejects_wrong_label_count() {
        let mut trainer = BackpropTrainer::new(output_only_network(), config());
        let mut training = vec![
            Box::new(MemoryFrameContainer::new(
                "two-labels",
                vec![FeatureFrame::new(vec![1.0, 2.0], vec![1.0, 0.0])],
            )) as Box<dyn FrameContainer>,
            example("good", vec![1.0, 2.0], 1.0),
        ];
        assert_eq!(
            trainer.prepare_network(&mut training),
            Err(TrainingError::DimensionMismatch {
                what: "target",
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_prepare_sizes_network() {
        let mut trainer = BackpropTrainer::new(output_only_network(), config());
        let mut training = vec![example("three", vec![1.0, 2.0, 3.0], 1.0)];
        trainer.prepare_network(&mut training).unwrap();
        assert_eq!(trainer.network().input_len(), Some(3));
    }
}
