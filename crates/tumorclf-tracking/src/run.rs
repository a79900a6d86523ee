use crate::{Result, RunInfo, RunStatus, TrackingStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A run that is still open for logging.
///
/// Dropping an `ActiveRun` without calling [`ActiveRun::finish`] leaves the
/// run in `RUNNING` state on the server.
pub struct ActiveRun {
    store: Arc<dyn TrackingStore>,
    info: RunInfo,
}

impl ActiveRun {
    pub async fn start(
        store: Arc<dyn TrackingStore>,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<Self> {
        let info = store.create_run(experiment_id, run_name).await?;
        debug!(run_id = %info.run_id, run_name, "Started run");
        Ok(Self { store, info })
    }

    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    pub fn info(&self) -> &RunInfo {
        &self.info
    }

    pub async fn log_param(&self, key: &str, value: impl ToString) -> Result<()> {
        self.store
            .log_param(&self.info.run_id, key, &value.to_string())
            .await
    }

    pub async fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.store.log_metric(&self.info.run_id, key, value, 0).await
    }

    pub async fn log_artifact(&self, local_path: &Path, artifact_dir: Option<&str>) -> Result<()> {
        self.store
            .log_artifact(&self.info.run_id, local_path, artifact_dir)
            .await
    }

    /// Close the run with `status` and return the run as the store now has it.
    pub async fn finish(self, status: RunStatus) -> Result<RunInfo> {
        self.store.set_terminated(&self.info.run_id, status).await?;
        if status != RunStatus::Finished {
            warn!(run_id = %self.info.run_id, %status, "Run terminated");
        }
        self.store.get_run(&self.info.run_id).await
    }
}
