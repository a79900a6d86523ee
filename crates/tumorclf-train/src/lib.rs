pub mod batch;
pub mod error;
pub mod job;
pub mod report;

pub use batch::{default_runs, run_batch, BatchOutcome, FailurePolicy, RunConfig};
pub use error::*;
pub use job::{train_model, RunSummary, TrainSettings};
pub use report::render_confusion_matrix;
