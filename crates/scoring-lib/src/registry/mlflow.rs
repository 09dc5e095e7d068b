//! MLflow tracking server client
//!
//! Speaks the subset of the MLflow REST API needed to resolve a model:
//! version search, run artifact download and run metrics.

use super::{ModelRegistry, RegisteredVersion};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_TRACKING_URI: &str = "https://dagshub.com/domires/fiap-mlops-score-model.mlflow";

/// Connection settings for an MLflow tracking server
#[derive(Debug, Clone)]
pub struct MlflowConfig {
    pub tracking_uri: String,
    /// Basic auth user; DagsHub expects the account name here
    pub username: Option<String>,
    /// Basic auth password or bearer token
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for MlflowConfig {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            username: None,
            token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchVersionsResponse {
    #[serde(default)]
    model_versions: Vec<RegisteredVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetRunResponse {
    run: RunPayload,
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    #[serde(default)]
    data: RunData,
}

#[derive(Debug, Default, Deserialize)]
struct RunData {
    #[serde(default)]
    metrics: Vec<RunMetric>,
}

#[derive(Debug, Deserialize)]
struct RunMetric {
    key: String,
    value: f64,
}

/// REST client for an MLflow tracking server
pub struct MlflowClient {
    client: Client,
    base_url: Url,
    username: Option<String>,
    token: Option<String>,
}

impl MlflowClient {
    pub fn new(config: MlflowConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.tracking_uri.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("Invalid tracking URI")?;

        Ok(Self {
            client,
            base_url,
            username: config.username,
            token: config.token,
        })
    }

    pub fn tracking_uri(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid registry path")
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.username, &self.token) {
            (Some(user), token) => request.basic_auth(user, token.as_ref()),
            (None, Some(token)) => request.bearer_auth(token),
            (None, None) => request,
        }
    }

    async fn get(&self, url: Url) -> Result<Response> {
        debug!(url = %url, "Registry request");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .context("Failed to send registry request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Registry error ({}): {}", status, body);
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelRegistry for MlflowClient {
    async fn search_versions(&self, model_name: &str) -> Result<Vec<RegisteredVersion>> {
        let mut versions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url("api/2.0/mlflow/model-versions/search")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("filter", &format!("name='{}'", model_name));
                if let Some(token) = &page_token {
                    query.append_pair("page_token", token);
                }
            }

            let page: SearchVersionsResponse = self
                .get(url)
                .await?
                .json()
                .await
                .context("Failed to parse model version search response")?;

            versions.extend(page.model_versions);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(versions)
    }

    async fn fetch_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let mut url = self.url("get-artifact")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("run_uuid", run_id);

        let bytes = self
            .get(url)
            .await
            .with_context(|| format!("Failed to download artifact {} of run {}", path, run_id))?
            .bytes()
            .await
            .context("Failed to read artifact body")?;

        Ok(bytes.to_vec())
    }

    async fn run_metrics(&self, run_id: &str) -> Result<BTreeMap<String, Value>> {
        let mut url = self.url("api/2.0/mlflow/runs/get")?;
        url.query_pairs_mut().append_pair("run_id", run_id);

        let response: GetRunResponse = self
            .get(url)
            .await?
            .json()
            .await
            .context("Failed to parse run response")?;

        Ok(response
            .run
            .data
            .metrics
            .into_iter()
            .map(|m| (m.key, Value::from(m.value)))
            .collect())
    }
}
