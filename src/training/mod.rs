// Training module - data-parallel backpropagation for the vocals classifier

pub mod gradient;
pub mod progress;
pub mod state;
pub mod trainer;
pub mod worker;

pub use progress::{ConsoleProgress, TrainingEvent, TrainingObserver, TrainingSummary};
pub use state::{StopReason, TrainingState};
pub use trainer::{split_corpus, worker_count, BackpropTrainer};
pub use worker::{partition, TestWorker, TrainWorker};
