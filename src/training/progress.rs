// Progress reporting for the training loop
//
// The trainer emits `TrainingEvent`s from its coordinating thread only.
// `ConsoleProgress` renders them as a single 80-column status line that is
// redrawn in place with a carriage return.

use std::io::Write;
use std::time::Duration;

/// Width of the rendered status line, brackets included
pub const PROGRESS_WIDTH: usize = 80;

const ERROR_CELL: usize = 10;
const EPOCH_CELL: usize = 4;

/// Outcome of a completed training run
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrainingSummary {
    /// Epochs run after the initial evaluation
    pub epochs: usize,
    /// Test-set mean squared error after the last epoch
    pub final_error: f64,
    /// True when the error delta dropped below the threshold
    pub converged: bool,
    /// Wall-clock duration of `train`
    pub elapsed: Duration,
}

/// Lifecycle events of a training run
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum TrainingEvent {
    /// An epoch's training pass is starting
    EpochStarted { epoch: usize },
    /// Training containers processed so far in the current epoch
    Progress { processed: usize, total: usize },
    /// Testing containers processed so far in the current evaluation
    Testing { processed: usize, total: usize },
    /// Evaluation after an epoch (epoch 0 is the initial evaluation)
    EpochFinished { epoch: usize, error: f64, delta: f64 },
    /// Training stopped
    Finished(TrainingSummary),
}

/// Receives training events
pub trait TrainingObserver: Send {
    fn on_event(&mut self, event: &TrainingEvent);
}

impl<F> TrainingObserver for F
where
    F: FnMut(&TrainingEvent) + Send,
{
    fn on_event(&mut self, event: &TrainingEvent) {
        self(event)
    }
}

/// Error rendered as a percentage with four decimals
pub fn error_percent(error: f64) -> f64 {
    (error * 100.0 * 10_000.0).round() / 10_000.0
}

/// Status line of the form `E: % <error> | Epoch: <n> |====    |`
///
/// # Arguments
/// * `error` - Latest test error (fraction, not percent)
/// * `epoch` - Current epoch
/// * `fraction` - Share of containers processed, clamped to [0, 1]
pub fn render_line(error: f64, epoch: usize, fraction: f64) -> String {
    let status = format!(
        "E: % {:<width_e$} | Epoch: {:<width_n$}",
        error_percent(error),
        epoch,
        width_e = ERROR_CELL,
        width_n = EPOCH_CELL
    );
    render_bar(&status, fraction)
}

/// Status line shown while the test set is being evaluated
pub fn render_testing_line(fraction: f64) -> String {
    render_bar("Testing...", fraction)
}

fn render_bar(status: &str, fraction: f64) -> String {
    let inner = PROGRESS_WIDTH.saturating_sub(status.len() + 3);
    let filled = ((fraction.clamp(0.0, 1.0) * inner as f64).round() as usize).min(inner);
    format!(
        "{} |{}{}|",
        status,
        "=".repeat(filled),
        " ".repeat(inner - filled)
    )
}

/// Redraws the status line on a terminal-like writer
pub struct ConsoleProgress<W: Write + Send> {
    out: W,
    last_error: f64,
    epoch: usize,
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_error: 0.0,
            epoch: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, line: &str) {
        // Write errors are ignored
        let _ = write!(self.out, "\r{}", line);
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> TrainingObserver for ConsoleProgress<W> {
    fn on_event(&mut self, event: &TrainingEvent) {
        match *event {
            TrainingEvent::EpochStarted { epoch } => {
                self.epoch = epoch;
                let line = render_line(self.last_error, epoch, 0.0);
                self.draw(&line);
            }
            TrainingEvent::Progress { processed, total } => {
                let line = render_line(self.last_error, self.epoch, ratio(processed, total));
                self.draw(&line);
            }
            TrainingEvent::Testing { processed, total } => {
                let line = render_testing_line(ratio(processed, total));
                self.draw(&line);
            }
            TrainingEvent::EpochFinished { epoch, error, .. } => {
                self.epoch = epoch;
                self.last_error = error;
                let line = render_line(error, epoch, 1.0);
                self.draw(&line);
            }
            TrainingEvent::Finished(_) => {
                let _ = writeln!(self.out);
                let _ = self.out.flush();
            }
        }
    }
}

fn ratio(processed: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        processed as f64 / total as f64
    }
}
