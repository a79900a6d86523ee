//! Tracking store backed by a local directory tree.
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/meta.json
//! <root>/<experiment_id>/<run_id>/params/<key>
//! <root>/<experiment_id>/<run_id>/metrics/<key>      "timestamp value step" lines
//! <root>/<experiment_id>/<run_id>/artifacts/...
//! <root>/models/<name>/meta.json
//! <root>/models/<name>/version-<n>/meta.json
//! ```

use crate::store::validate_artifact_path;
use crate::{Experiment, ModelVersion, Result, RunInfo, RunStatus, TrackingError, TrackingStore};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

const META_FILE: &str = "meta.json";
const MODELS_DIR: &str = "models";

#[derive(Debug, Serialize, Deserialize)]
struct RegisteredModelMeta {
    name: String,
    creation_timestamp: i64,
}

pub struct FileStore {
    root: PathBuf,
    // Serializes id and version allocation
    allocation: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allocation: Mutex::new(()),
        }
    }

    /// Build a store from a `file:` URI (`file:./experiments`, `file:///var/mlruns`).
    pub fn from_uri(uri: &str) -> Result<Self> {
        let path = uri
            .strip_prefix("file://")
            .or_else(|| uri.strip_prefix("file:"))
            .ok_or_else(|| TrackingError::InvalidUri(uri.to_string()))?;
        if path.is_empty() {
            return Err(TrackingError::InvalidUri(uri.to_string()));
        }
        Ok(Self::new(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn experiment_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_experiment(&self, name: &str) -> Result<Option<Experiment>> {
        for id in self.experiment_ids().await? {
            let meta = self.root.join(id.to_string()).join(META_FILE);
            if !fs::try_exists(&meta).await? {
                continue;
            }
            let experiment: Experiment = read_json(&meta).await?;
            if experiment.name == name {
                return Ok(Some(experiment));
            }
        }
        Ok(None)
    }

    async fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.is_empty() || !run_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TrackingError::RunNotFound(run_id.to_string()));
        }
        for id in self.experiment_ids().await? {
            let dir = self.root.join(id.to_string()).join(run_id);
            if fs::try_exists(dir.join(META_FILE)).await? {
                return Ok(dir);
            }
        }
        Err(TrackingError::RunNotFound(run_id.to_string()))
    }

    fn model_dir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(TrackingError::InvalidState(format!(
                "invalid registered model name: {:?}",
                name
            )));
        }
        Ok(self.root.join(MODELS_DIR).join(name))
    }

    async fn version_numbers(dir: &Path) -> Result<Vec<u32>> {
        let mut versions = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(n) = file_name
                .to_str()
                .and_then(|s| s.strip_prefix("version-"))
                .and_then(|s| s.parse().ok())
            {
                versions.push(n);
            }
        }
        Ok(versions)
    }
}

#[async_trait]
impl TrackingStore for FileStore {
    fn location(&self) -> String {
        format!("file:{}", self.root.display())
    }

    async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let _guard = self.allocation.lock().await;

        if let Some(experiment) = self.find_experiment(name).await? {
            return Ok(experiment);
        }

        let next_id = self.experiment_ids().await?.last().map_or(1, |id| id + 1);
        let dir = self.root.join(next_id.to_string());
        fs::create_dir_all(&dir).await?;

        let experiment = Experiment {
            experiment_id: next_id.to_string(),
            name: name.to_string(),
            artifact_location: dir.display().to_string(),
        };
        write_json(&dir.join(META_FILE), &experiment).await?;
        debug!(experiment_id = %experiment.experiment_id, name, "Created experiment");
        Ok(experiment)
    }

    async fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<RunInfo> {
        let experiment_dir = self.root.join(experiment_id);
        if experiment_id.parse::<u64>().is_err()
            || !fs::try_exists(experiment_dir.join(META_FILE)).await?
        {
            return Err(TrackingError::ExperimentNotFound(experiment_id.to_string()));
        }

        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = experiment_dir.join(&run_id);
        for sub in ["params", "metrics", "artifacts"] {
            fs::create_dir_all(run_dir.join(sub)).await?;
        }

        let info = RunInfo {
            run_id,
            experiment_id: experiment_id.to_string(),
            run_name: run_name.to_string(),
            status: RunStatus::Running,
            start_time: now_millis(),
            end_time: None,
            artifact_uri: run_dir.join("artifacts").display().to_string(),
        };
        write_json(&run_dir.join(META_FILE), &info).await?;
        Ok(info)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        let dir = self.run_dir(run_id).await?;
        read_json(&dir.join(META_FILE)).await
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        validate_artifact_path(key)?;
        let path = self.run_dir(run_id).await?.join("params").join(key);

        // Parameters are write-once
        if fs::try_exists(&path).await? {
            let existing = fs::read_to_string(&path).await?;
            if existing != value {
                return Err(TrackingError::InvalidState(format!(
                    "param {} already logged with value {:?}",
                    key, existing
                )));
            }
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, value).await?;
        Ok(())
    }

    async fn log_metric(&self, run_id: &str, key: &str, value: f64, step: i64) -> Result<()> {
        validate_artifact_path(key)?;
        let path = self.run_dir(run_id).await?.join("metrics").join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("{} {} {}\n", now_millis(), value, step).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    async fn log_artifact(
        &self,
        run_id: &str,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<()> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrackingError::InvalidArtifactPath(local_path.display().to_string()))?;

        let mut target = self.run_dir(run_id).await?.join("artifacts");
        if let Some(dir) = artifact_dir {
            validate_artifact_path(dir)?;
            target = target.join(dir);
        }
        fs::create_dir_all(&target).await?;
        fs::copy(local_path, target.join(file_name)).await?;
        Ok(())
    }

    async fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let meta = self.run_dir(run_id).await?.join(META_FILE);
        let mut info: RunInfo = read_json(&meta).await?;
        info.status = status;
        info.end_time = Some(now_millis());
        write_json(&meta, &info).await
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let _guard = self.allocation.lock().await;

        let dir = self.model_dir(name)?;
        let meta = dir.join(META_FILE);
        if !fs::try_exists(&meta).await? {
            fs::create_dir_all(&dir).await?;
            let registered = RegisteredModelMeta {
                name: name.to_string(),
                creation_timestamp: now_millis(),
            };
            write_json(&meta, &registered).await?;
        }

        let version = Self::version_numbers(&dir).await?.into_iter().max().unwrap_or(0) + 1;
        let model_version = ModelVersion {
            name: name.to_string(),
            version,
            source: source.to_string(),
            run_id: run_id.to_string(),
            creation_timestamp: now_millis(),
        };

        let version_dir = dir.join(format!("version-{}", version));
        fs::create_dir_all(&version_dir).await?;
        write_json(&version_dir.join(META_FILE), &model_version).await?;
        Ok(model_version)
    }

    async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion> {
        let not_found = || TrackingError::ModelVersionNotFound {
            name: name.to_string(),
            version: version.to_string(),
        };
        let number: u32 = version.trim().parse().map_err(|_| not_found())?;
        let meta = self
            .model_dir(name)?
            .join(format!("version-{}", number))
            .join(META_FILE);
        if !fs::try_exists(&meta).await? {
            return Err(not_found());
        }
        read_json(&meta).await
    }

    async fn read_artifact(&self, run_id: &str, path: &str) -> Result<Bytes> {
        validate_artifact_path(path)?;
        let file = self.run_dir(run_id).await?.join("artifacts").join(path);
        match fs::read(&file).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TrackingError::ArtifactNotFound {
                    run_id: run_id.to_string(),
                    path: path.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    fs::write(path, content).await?;
    Ok(())
}
