use crate::job::{train_model, RunSummary, TrainSettings};
use crate::{Result, TrainError};
use std::sync::Arc;
use tracing::{error, info};
use tumorclf_core::ForestParams;
use tumorclf_tracking::TrackingStore;

/// A named hyperparameter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub name: String,
    pub params: ForestParams,
}

impl RunConfig {
    pub fn new(name: impl Into<String>, n_estimators: u16, max_depth: Option<u16>) -> Self {
        Self {
            name: name.into(),
            params: ForestParams::new(n_estimators, max_depth),
        }
    }
}

/// The three configurations trained by a default batch.
pub fn default_runs() -> Vec<RunConfig> {
    vec![
        RunConfig::new("Run_1_Simple", 50, Some(3)),
        RunConfig::new("Run_2_Complex", 100, Some(10)),
        RunConfig::new("Run_3_Full", 200, None),
    ]
}

/// What the batch does when a run fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure and return it.
    #[default]
    Abort,
    /// Record the failure and continue with the next run.
    Skip,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: Vec<RunSummary>,
    pub failed: Vec<(String, TrainError)>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Train `runs` one after another.
pub async fn run_batch(
    store: Arc<dyn TrackingStore>,
    settings: &TrainSettings,
    runs: &[RunConfig],
    policy: FailurePolicy,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for config in runs {
        match train_model(store.clone(), settings, config.params, &config.name).await {
            Ok(summary) => outcome.completed.push(summary),
            Err(e) => {
                error!("Run {} failed: {}", config.name, e);
                match policy {
                    FailurePolicy::Abort => {
                        return Err(TrainError::RunFailed {
                            run_name: config.name.clone(),
                            source: Box::new(e),
                        })
                    }
                    FailurePolicy::Skip => outcome.failed.push((config.name.clone(), e)),
                }
            }
        }
    }

    info!(
        completed = outcome.completed.len(),
        failed = outcome.failed.len(),
        "Batch finished"
    );
    Ok(outcome)
}
