use crate::dataset::DatasetExample;
use crate::traces::TraceRun;
use moltscrape_core::CoreError;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

const INSIGHTS_API_BASE: &str = "https://api.smith.langchain.com/api/v1";

/// Thin client for the analytics service's write API. Authenticates
/// every call with the `x-api-key` header.
#[derive(Debug)]
pub struct InsightsClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
}

fn request_failed(endpoint: &str, status: StatusCode) -> CoreError {
    CoreError::RequestFailed {
        message: format!("{} returned {}", endpoint, status),
        status_code: Some(status.as_u16()),
    }
}

impl InsightsClient {
    pub fn new(api_key: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: INSIGHTS_API_BASE.to_string(),
            api_key,
        }
    }

    /// Point the client at a different service endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", endpoint);
        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Create the dataset, or fetch it by name when creation reports it
    /// already exists.
    pub async fn ensure_dataset(
        &self,
        name: &str,
        description: &str,
    ) -> Result<DatasetInfo, CoreError> {
        let body = json!({ "name": name, "description": description });
        let response = self.post_json("/datasets", &body).await?;

        match response.status() {
            status if status.is_success() => {
                let dataset: DatasetInfo = response.json().await?;
                info!("Created new dataset: {}", name);
                Ok(dataset)
            }
            StatusCode::CONFLICT => {
                info!("Using existing dataset: {}", name);
                self.read_dataset(name).await
            }
            status => Err(request_failed("/datasets", status)),
        }
    }

    async fn read_dataset(&self, name: &str) -> Result<DatasetInfo, CoreError> {
        let url = format!("{}/datasets", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[("name", name)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(request_failed("/datasets", status));
        }

        let datasets: Vec<DatasetInfo> = response.json().await?;
        datasets
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::RequestFailed {
                message: format!("dataset {} reported as existing but not found", name),
                status_code: None,
            })
    }

    pub async fn create_example(
        &self,
        dataset_id: &str,
        example: &DatasetExample,
    ) -> Result<(), CoreError> {
        let body = json!({
            "dataset_id": dataset_id,
            "inputs": example.inputs,
            "outputs": example.outputs,
            "metadata": example.metadata,
        });
        let response = self.post_json("/examples", &body).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(request_failed("/examples", status))
        }
    }

    pub async fn create_run(&self, run: &TraceRun) -> Result<(), CoreError> {
        let body = serde_json::to_value(run)?;
        let response = self.post_json("/runs", &body).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(request_failed("/runs", status))
        }
    }

    /// Post ids already ingested into a tracing project, for dedup on
    /// re-upload.
    pub async fn list_run_post_ids(
        &self,
        project_name: &str,
        limit: usize,
    ) -> Result<HashSet<String>, CoreError> {
        let body = json!({ "project_name": project_name, "limit": limit });
        let response = self.post_json("/runs/query", &body).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(request_failed("/runs/query", status));
        }

        let page: Value = response.json().await?;
        let mut post_ids = HashSet::new();
        if let Some(runs) = page.get("runs").and_then(|v| v.as_array()) {
            for run in runs {
                if let Some(post_id) = run
                    .pointer("/extra/metadata/post_id")
                    .and_then(|v| v.as_str())
                {
                    post_ids.insert(post_id.to_string());
                }
            }
        }
        Ok(post_ids)
    }
}
