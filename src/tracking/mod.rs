//! Client for logging model artifacts to an MLflow-compatible tracking
//! server (DagsHub by default).
//!
//! Every call is attempted exactly once; the caller decides what a failure
//! means.

use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::TrackingError;

pub const DEFAULT_TRACKING_URI: &str =
    "https://dagshub.com/laxmikantbabaleshwar07/zomato-swiggy-delivery-time-prediction.mlflow";
pub const EXPERIMENT_NAME: &str = "DVC Pipeline";
pub const RUN_NAME: &str = "register_model";
pub const ARTIFACT_DIR: &str = "models";
pub const DEFAULT_MODEL_PATH: &str = "models/delivery_time_pred_model.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub tracking_uri: String,
    pub credentials: Option<Credentials>,
    pub model_path: PathBuf,
    pub experiment_name: String,
    pub run_name: String,
}

impl TrackingConfig {
    /// Reads `MLFLOW_TRACKING_URI`, `DAGSHUB_USERNAME`, `DAGSHUB_TOKEN` and
    /// `ETA_MODEL_PATH`. Credentials are only used when both are non-empty.
    pub fn from_env() -> Result<Self, TrackingError> {
        let tracking_uri =
            env::var("MLFLOW_TRACKING_URI").unwrap_or_else(|_| DEFAULT_TRACKING_URI.to_string());
        if !tracking_uri.starts_with("http://") && !tracking_uri.starts_with("https://") {
            return Err(TrackingError::Config(format!(
                "tracking URI must be http(s): {}",
                tracking_uri
            )));
        }

        let username = env::var("DAGSHUB_USERNAME").unwrap_or_default();
        let password = env::var("DAGSHUB_TOKEN").unwrap_or_default();
        let credentials = if username.is_empty() || password.is_empty() {
            None
        } else {
            Some(Credentials { username, password })
        };

        let model_path = env::var("ETA_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH));

        Ok(Self {
            tracking_uri,
            credentials,
            model_path,
            experiment_name: EXPERIMENT_NAME.to_string(),
            run_name: RUN_NAME.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    #[serde(default)]
    pub artifact_uri: String,
}

impl RunInfo {
    /// Location of the run's artifact root on the server's artifact proxy.
    pub fn artifact_root(&self) -> String {
        match self.artifact_uri.strip_prefix("mlflow-artifacts:") {
            Some(rest) => {
                let path = match rest.strip_prefix("//") {
                    // Drop the authority part of mlflow-artifacts://host/path.
                    Some(with_host) => with_host.find('/').map(|i| &with_host[i..]).unwrap_or(""),
                    None => rest,
                };
                path.trim_matches('/').to_string()
            }
            None => format!("{}/{}/artifacts", self.experiment_id, self.run_id),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedArtifact {
    pub experiment_id: String,
    pub run_id: String,
    pub artifact_path: String,
}

#[derive(Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: Run,
}

#[derive(Deserialize)]
struct Run {
    info: RunInfo,
}

pub struct MlflowClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl MlflowClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self, TrackingError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("delivery-eta/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/{}", self.base_url, endpoint));
        match &self.credentials {
            Some(c) => builder.basic_auth(&c.username, Some(&c.password)),
            None => builder,
        }
    }

    pub async fn get_or_create_experiment(&self, name: &str) -> Result<String, TrackingError> {
        let endpoint = "api/2.0/mlflow/experiments/get-by-name";
        let response = self
            .request(Method::GET, endpoint)
            .query(&[("experiment_name", name)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(experiment = name, "Experiment not found, creating it");
            return self.create_experiment(name).await;
        }
        let found: GetExperimentResponse = check(endpoint, response).await?.json().await?;
        Ok(found.experiment.experiment_id)
    }

    async fn create_experiment(&self, name: &str) -> Result<String, TrackingError> {
        let endpoint = "api/2.0/mlflow/experiments/create";
        let response = self
            .request(Method::POST, endpoint)
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let created: CreateExperimentResponse = check(endpoint, response).await?.json().await?;
        Ok(created.experiment_id)
    }

    pub async fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<RunInfo, TrackingError> {
        let endpoint = "api/2.0/mlflow/runs/create";
        let response = self
            .request(Method::POST, endpoint)
            .json(&json!({
                "experiment_id": experiment_id,
                "run_name": run_name,
                "start_time": Utc::now().timestamp_millis(),
                "tags": [{ "key": "mlflow.runName", "value": run_name }],
            }))
            .send()
            .await?;
        let created: CreateRunResponse = check(endpoint, response).await?.json().await?;
        Ok(created.run.info)
    }

    /// Uploads `local` as `<artifact_dir>/<file name>` under the run.
    pub async fn log_artifact(
        &self,
        run: &RunInfo,
        local: &Path,
        artifact_dir: &str,
    ) -> Result<String, TrackingError> {
        let file_name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrackingError::Config(format!("not a file path: {}", local.display())))?;
        let contents = tokio::fs::read(local).await.map_err(|source| TrackingError::Artifact {
            path: local.to_path_buf(),
            source,
        })?;

        let artifact_path = format!("{}/{}", artifact_dir.trim_matches('/'), file_name);
        let endpoint = format!(
            "api/2.0/mlflow-artifacts/artifacts/{}/{}",
            run.artifact_root(),
            artifact_path
        );
        let response = self
            .request(Method::PUT, &endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(contents)
            .send()
            .await?;
        check(&endpoint, response).await?;
        Ok(artifact_path)
    }

    pub async fn set_terminated(&self, run_id: &str, status: RunStatus) -> Result<(), TrackingError> {
        let endpoint = "api/2.0/mlflow/runs/update";
        let response = self
            .request(Method::POST, endpoint)
            .json(&json!({
                "run_id": run_id,
                "status": status.as_str(),
                "end_time": Utc::now().timestamp_millis(),
            }))
            .send()
            .await?;
        check(endpoint, response).await?;
        Ok(())
    }
}

async fn check(endpoint: &str, response: Response) -> Result<Response, TrackingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TrackingError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Logs the model file as a run artifact. The run is closed as `FAILED` if
/// the upload does not go through.
pub async fn register_model(config: &TrackingConfig) -> Result<LoggedArtifact, TrackingError> {
    let client = MlflowClient::new(&config.tracking_uri, config.credentials.clone())?;

    let experiment_id = client.get_or_create_experiment(&config.experiment_name).await?;
    let run = client.create_run(&experiment_id, &config.run_name).await?;
    tracing::info!(experiment_id = %experiment_id, run_id = %run.run_id, "Started tracking run");

    match client.log_artifact(&run, &config.model_path, ARTIFACT_DIR).await {
        Ok(artifact_path) => {
            client.set_terminated(&run.run_id, RunStatus::Finished).await?;
            Ok(LoggedArtifact {
                experiment_id,
                run_id: run.run_id,
                artifact_path,
            })
        }
        Err(err) => {
            if let Err(close_err) = client.set_terminated(&run.run_id, RunStatus::Failed).await {
                tracing::warn!(error = %close_err, "Could not mark run as failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(artifact_uri: &str) -> RunInfo {
        RunInfo {
            run_id: "abc".into(),
            experiment_id: "7".into(),
            artifact_uri: artifact_uri.into(),
        }
    }

    #[test]
    fn test_artifact_root_from_proxy_uri() {
        assert_eq!(run("mlflow-artifacts:/7/abc/artifacts").artifact_root(), "7/abc/artifacts");
        assert_eq!(
            run("mlflow-artifacts://tracking.example.com/7/abc/artifacts").artifact_root(),
            "7/abc/artifacts"
        );
    }

    #[test]
    fn test_artifact_root_falls_back_to_run_layout() {
        assert_eq!(run("s3://bucket/7/abc/artifacts").artifact_root(), "7/abc/artifacts");
        assert_eq!(run("").artifact_root(), "7/abc/artifacts");
    }
}
