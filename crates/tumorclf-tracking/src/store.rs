use crate::{Result, TrackingError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
    pub status: RunStatus,
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub artifact_uri: String,
}

/// One registered version of a named model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    /// Location of the model artifacts, normally `runs:/<run_id>/<path>`
    pub source: String,
    pub run_id: String,
    pub creation_timestamp: i64,
}

/// Experiment tracker and model registry.
///
/// Implemented by the local [`FileStore`](crate::FileStore) and the
/// [`MlflowStore`](crate::MlflowStore) REST client.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Human readable location of the store, used in logs
    fn location(&self) -> String;

    async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment>;

    async fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<RunInfo>;

    async fn get_run(&self, run_id: &str) -> Result<RunInfo>;

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    async fn log_metric(&self, run_id: &str, key: &str, value: f64, step: i64) -> Result<()>;

    /// Upload `local_path` as `<artifact_dir>/<file name>`, or at the artifact
    /// root when `artifact_dir` is `None`.
    async fn log_artifact(
        &self,
        run_id: &str,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<()>;

    async fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Register a new version of `name`; the store assigns the next number.
    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion>;

    async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion>;

    async fn read_artifact(&self, run_id: &str, path: &str) -> Result<Bytes>;
}

/// `models:/<name>/<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    pub name: String,
    pub version: String,
}

impl ModelUri {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "models:/{}/{}", self.name, self.version)
    }
}

impl FromStr for ModelUri {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("models:/")
            .ok_or_else(|| TrackingError::InvalidUri(s.to_string()))?;
        match rest.rsplit_once('/') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(name, version))
            }
            _ => Err(TrackingError::InvalidUri(s.to_string())),
        }
    }
}

/// `runs:/<run_id>/<artifact path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunsUri {
    pub run_id: String,
    pub path: String,
}

impl RunsUri {
    pub fn new(run_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            path: path.into(),
        }
    }

    /// Path of `file_name` below this URI's artifact directory
    pub fn join(&self, file_name: &str) -> String {
        if self.path.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.path, file_name)
        }
    }
}

impl fmt::Display for RunsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runs:/{}/{}", self.run_id, self.path)
    }
}

impl FromStr for RunsUri {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("runs:/")
            .ok_or_else(|| TrackingError::InvalidUri(s.to_string()))?;
        let (run_id, path) = rest.split_once('/').unwrap_or((rest, ""));
        if run_id.is_empty() {
            return Err(TrackingError::InvalidUri(s.to_string()));
        }
        Ok(Self::new(run_id, path.trim_end_matches('/')))
    }
}

/// Reject artifact paths that are absolute or climb out of the run directory.
pub(crate) fn validate_artifact_path(path: &str) -> Result<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(TrackingError::InvalidArtifactPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_uri() {
        let uri: ModelUri = "models:/ClassificationModel/3".parse().unwrap();
        assert_eq!(uri, ModelUri::new("ClassificationModel", "3"));
        assert_eq!(uri.to_string(), "models:/ClassificationModel/3");
        assert!("models:/NoVersion".parse::<ModelUri>().is_err());
        assert!("runs:/abc/model".parse::<ModelUri>().is_err());
    }

    #[test]
    fn parses_runs_uri() {
        let uri: RunsUri = "runs:/abc123/model".parse().unwrap();
        assert_eq!(uri.run_id, "abc123");
        assert_eq!(uri.join("model.json"), "model/model.json");

        let root: RunsUri = "runs:/abc123".parse().unwrap();
        assert_eq!(root.join("scaler.json"), "scaler.json");
    }

    #[test]
    fn artifact_paths_stay_inside_run() {
        assert!(validate_artifact_path("preprocessing/scaler.json").is_ok());
        assert!(validate_artifact_path("../secrets").is_err());
        assert!(validate_artifact_path("/etc/passwd").is_err());
        assert!(validate_artifact_path("a//b").is_err());
    }

    #[test]
    fn status_serializes_like_mlflow() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Finished).unwrap(),
            "\"FINISHED\""
        );
    }
}
