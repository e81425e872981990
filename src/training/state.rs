// TrainingState - epoch counter and error history of a training run

use crate::config::TrainingConfig;

/// Why the training loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// |error - previous error| fell below the threshold
    Converged,
    /// The epoch cap was reached first
    EpochLimit,
}

/// Mutable bookkeeping of the training loop
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    /// Completed epochs
    pub epoch: usize,
    /// Most recent test-set error
    pub error: f64,
    /// Error before the most recent epoch
    pub previous_error: f64,
}

impl TrainingState {
    /// State after the initial (pre-training) evaluation
    pub fn new(initial_error: f64) -> Self {
        Self {
            epoch: 0,
            error: initial_error,
            previous_error: initial_error,
        }
    }

    /// Learning rate for the epoch about to run
    pub fn learning_rate(&self, config: &TrainingConfig) -> f64 {
        config.learning_rate(self.epoch)
    }

    /// Record the error measured after an epoch
    pub fn record(&mut self, error: f64) {
        self.previous_error = self.error;
        self.error = error;
        self.epoch += 1;
    }

    /// Error change of the last epoch (negative when improving)
    pub fn delta(&self) -> f64 {
        self.error - self.previous_error
    }

    /// Whether training should stop, and why
    pub fn stop_reason(&self, config: &TrainingConfig) -> Option<StopReason> {
        if self.epoch > 0 && self.delta().abs() < config.min_delta_error {
            Some(StopReason::Converged)
        } else if self.epoch >= config.max_epochs {
            Some(StopReason::EpochLimit)
        } else {
            None
        }
    }
}
