//! Client for an MLflow tracking server (REST API 2.0).
//!
//! Artifacts go through the server's `mlflow-artifacts` proxy, so runs must
//! have an `mlflow-artifacts:/...` artifact URI (the default when the server
//! is started with `--serve-artifacts`).

use crate::store::validate_artifact_path;
use crate::{Experiment, ModelVersion, Result, RunInfo, RunStatus, TrackingError, TrackingStore};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const ARTIFACT_SCHEME: &str = "mlflow-artifacts:";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ExperimentResponse {
    experiment: ExperimentBody,
}

#[derive(Debug, Deserialize)]
struct ExperimentBody {
    experiment_id: String,
    name: String,
    #[serde(default)]
    artifact_location: String,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    #[allow(dead_code)]
    experiment_id: String,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    experiment_id: &'a str,
    run_name: &'a str,
    start_time: i64,
    tags: Vec<RunTag<'a>>,
}

#[derive(Debug, Serialize)]
struct RunTag<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    run: RunBody,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    info: RunInfoBody,
}

#[derive(Debug, Deserialize)]
struct RunInfoBody {
    run_id: String,
    experiment_id: String,
    #[serde(default)]
    run_name: String,
    status: RunStatus,
    #[serde(default, deserialize_with = "lenient_i64")]
    start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    end_time: Option<i64>,
    #[serde(default)]
    artifact_uri: String,
}

impl From<RunInfoBody> for RunInfo {
    fn from(body: RunInfoBody) -> Self {
        RunInfo {
            run_id: body.run_id,
            experiment_id: body.experiment_id,
            run_name: body.run_name,
            status: body.status,
            start_time: body.start_time.unwrap_or_default(),
            end_time: body.end_time,
            artifact_uri: body.artifact_uri,
        }
    }
}

#[derive(Debug, Serialize)]
struct LogParamRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct LogMetricRequest<'a> {
    run_id: &'a str,
    key: &'a str,
    value: f64,
    timestamp: i64,
    step: i64,
}

#[derive(Debug, Serialize)]
struct UpdateRunRequest<'a> {
    run_id: &'a str,
    status: RunStatus,
    end_time: i64,
}

#[derive(Debug, Serialize)]
struct CreateModelVersionRequest<'a> {
    name: &'a str,
    source: &'a str,
    run_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModelVersionResponse {
    model_version: ModelVersionBody,
}

#[derive(Debug, Deserialize)]
struct ModelVersionBody {
    name: String,
    version: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    run_id: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    creation_timestamp: Option<i64>,
}

impl TryFrom<ModelVersionBody> for ModelVersion {
    type Error = TrackingError;

    fn try_from(body: ModelVersionBody) -> Result<Self> {
        let version = body.version.parse().map_err(|_| {
            TrackingError::InvalidState(format!(
                "server returned non-numeric model version {:?}",
                body.version
            ))
        })?;
        Ok(ModelVersion {
            name: body.name,
            version,
            source: body.source,
            run_id: body.run_id,
            creation_timestamp: body.creation_timestamp.unwrap_or_default(),
        })
    }
}

/// int64 fields may arrive as JSON numbers or strings depending on server version.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

pub struct MlflowStore {
    client: Client,
    base: Url,
}

impl MlflowStore {
    pub fn new(base_uri: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_uri).map_err(|e| TrackingError::InvalidUri(format!("{}: {}", base_uri, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TrackingError::InvalidUri(base_uri.to_string()));
        }
        // Url::join replaces the last segment unless the path ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| TrackingError::InvalidUri(format!("{}: {}", path, e)))
    }

    fn api(&self, method: &str) -> Result<Url> {
        self.endpoint(&format!("api/2.0/mlflow/{}", method))
    }

    /// Map a run-relative artifact path to the proxy endpoint.
    async fn artifact_url(&self, run_id: &str, path: &str) -> Result<Url> {
        validate_artifact_path(path)?;
        let run = self.get_run(run_id).await?;
        let location = run
            .artifact_uri
            .strip_prefix(ARTIFACT_SCHEME)
            .ok_or_else(|| {
                TrackingError::InvalidUri(format!(
                    "unsupported artifact location {} (serve artifacts through the tracking server)",
                    run.artifact_uri
                ))
            })?
            .trim_start_matches('/')
            .trim_end_matches('/');

        self.endpoint(&format!(
            "api/2.0/mlflow-artifacts/artifacts/{}/{}",
            location, path
        ))
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self.client.get(self.api(method)?).query(query).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.client.post(self.api(method)?).json(body).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or(ErrorBody {
        error_code: status
            .canonical_reason()
            .unwrap_or("UNKNOWN")
            .to_string(),
        message: text,
    });
    Err(TrackingError::Api {
        status: status.as_u16(),
        error_code: body.error_code,
        message: body.message,
    })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl TrackingStore for MlflowStore {
    fn location(&self) -> String {
        self.base.to_string()
    }

    async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let lookup = self
            .get::<ExperimentResponse>("experiments/get-by-name", &[("experiment_name", name)])
            .await;

        let body = match lookup {
            Ok(found) => found.experiment,
            Err(e) if e.is_not_found() => {
                info!(name, "Creating experiment on tracking server");
                let _: CreateExperimentResponse = self
                    .post("experiments/create", &serde_json::json!({ "name": name }))
                    .await?;
                self.get::<ExperimentResponse>(
                    "experiments/get-by-name",
                    &[("experiment_name", name)],
                )
                .await?
                .experiment
            }
            Err(e) => return Err(e),
        };

        Ok(Experiment {
            experiment_id: body.experiment_id,
            name: body.name,
            artifact_location: body.artifact_location,
        })
    }

    async fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<RunInfo> {
        let request = CreateRunRequest {
            experiment_id,
            run_name,
            start_time: now_millis(),
            tags: vec![RunTag {
                key: "mlflow.runName",
                value: run_name,
            }],
        };
        let response: RunResponse = self.post("runs/create", &request).await?;
        Ok(response.run.info.into())
    }

    async fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        let response: RunResponse = self.get("runs/get", &[("run_id", run_id)]).await?;
        Ok(response.run.info.into())
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post("runs/log-parameter", &LogParamRequest { run_id, key, value })
            .await?;
        Ok(())
    }

    async fn log_metric(&self, run_id: &str, key: &str, value: f64, step: i64) -> Result<()> {
        let request = LogMetricRequest {
            run_id,
            key,
            value,
            timestamp: now_millis(),
            step,
        };
        let _: serde_json::Value = self.post("runs/log-metric", &request).await?;
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
        let path = match artifact_dir {
            Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), file_name),
            None => file_name.to_string(),
        };

        let url = self.artifact_url(run_id, &path).await?;
        let content = tokio::fs::read(local_path).await?;
        debug!(%url, bytes = content.len(), "Uploading artifact");

        let response = self.client.put(url).body(content).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let request = UpdateRunRequest {
            run_id,
            status,
            end_time: now_millis(),
        };
        let _: serde_json::Value = self.post("runs/update", &request).await?;
        Ok(())
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let registered: Result<serde_json::Value> = self
            .post("registered-models/create", &serde_json::json!({ "name": name }))
            .await;
        match registered {
            Ok(_) => info!(name, "Registered new model"),
            Err(TrackingError::Api { ref error_code, .. })
                if error_code == "RESOURCE_ALREADY_EXISTS" => {}
            Err(e) => return Err(e),
        }

        let response: ModelVersionResponse = self
            .post(
                "model-versions/create",
                &CreateModelVersionRequest {
                    name,
                    source,
                    run_id,
                },
            )
            .await?;
        response.model_version.try_into()
    }

    async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion> {
        let response = self
            .get::<ModelVersionResponse>(
                "model-versions/get",
                &[("name", name), ("version", version)],
            )
            .await;
        match response {
            Ok(found) => found.model_version.try_into(),
            Err(e) if e.is_not_found() => Err(TrackingError::ModelVersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn read_artifact(&self, run_id: &str, path: &str) -> Result<Bytes> {
        let url = self.artifact_url(run_id, path).await?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TrackingError::ArtifactNotFound {
                run_id: run_id.to_string(),
                path: path.to_string(),
            });
        }
        Ok(check(response).await?.bytes().await?)
    }
}
