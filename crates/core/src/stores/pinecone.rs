use crate::models::{Metadata, ScoredRecord, VectorRecord};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

pub const DEFAULT_CONTROLLER_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const BACKEND: &str = "pinecone";

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub controller_url: String,
    pub api_key: String,
    pub namespace: String,
    pub cloud: String,
    pub region: String,
    pub metric: String,
    pub ready_poll_interval: Duration,
    pub ready_poll_attempts: usize,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            controller_url: DEFAULT_CONTROLLER_URL.to_string(),
            api_key: api_key.into(),
            namespace: String::new(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            metric: "cosine".to_string(),
            ready_poll_interval: Duration::from_secs(1),
            ready_poll_attempts: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: Option<String>,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// Serverless Pinecone index reached through its REST control and data planes.
pub struct PineconeStore {
    client: Client,
    config: PineconeConfig,
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeStore {
    pub fn new(client: Client, config: PineconeConfig) -> Self {
        Self {
            client,
            config,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn controller_url(&self, path: &str) -> Result<Url, SearchError> {
        let base = format!("{}/", self.config.controller_url.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn describe_index(&self, index_name: &str) -> Result<IndexDescription, SearchError> {
        let url = self.controller_url(&format!("indexes/{index_name}"))?;
        let response = self.request(Method::GET, url).send().await?;
        let response = ensure_success(response, "describe index").await?;
        Ok(response.json().await?)
    }

    async fn wait_until_ready(&self, index_name: &str) -> Result<(), SearchError> {
        for attempt in 1..=self.config.ready_poll_attempts.max(1) {
            let description = self.describe_index(index_name).await?;
            if description.status.ready {
                if let Some(host) = description.host {
                    self.hosts
                        .write()
                        .await
                        .insert(index_name.to_string(), normalize_host(&host));
                }
                return Ok(());
            }

            tracing::debug!(
                index = index_name,
                attempt,
                state = ?description.status.state,
                "waiting for index to become ready"
            );
            tokio::time::sleep(self.config.ready_poll_interval).await;
        }

        Err(SearchError::NotReady(index_name.to_string()))
    }

    async fn data_url(&self, index_name: &str, path: &str) -> Result<Url, SearchError> {
        let cached = self.hosts.read().await.get(index_name).cloned();
        let host = match cached {
            Some(host) => host,
            None => {
                let host = self
                    .describe_index(index_name)
                    .await?
                    .host
                    .map(|host| normalize_host(&host))
                    .ok_or_else(|| SearchError::NotReady(index_name.to_string()))?;
                self.hosts
                    .write()
                    .await
                    .insert(index_name.to_string(), host.clone());
                host
            }
        };

        Ok(Url::parse(&format!("{}/", host.trim_end_matches('/')))?.join(path)?)
    }

    async fn describe_index_stats(&self, index_name: &str) -> Result<IndexStats, SearchError> {
        let url = self.data_url(index_name, "describe_index_stats").await?;
        let response = self.request(Method::POST, url).json(&json!({})).send().await?;
        let response = ensure_success(response, "describe index stats").await?;
        Ok(response.json().await?)
    }

    fn with_namespace(&self, mut body: Value) -> Value {
        if !self.config.namespace.is_empty() {
            body["namespace"] = Value::String(self.config.namespace.clone());
        }
        body
    }
}

#[async_trait]
impl VectorIndex for PineconeStore {
    async fn create_index_if_absent(
        &self,
        index_name: &str,
        dimension: usize,
    ) -> Result<(), SearchError> {
        let url = self.controller_url("indexes")?;
        let response = self
            .request(Method::POST, url)
            .json(&json!({
                "name": index_name,
                "dimension": dimension,
                "metric": self.config.metric,
                "spec": {
                    "serverless": {
                        "cloud": self.config.cloud,
                        "region": self.config.region,
                    }
                }
            }))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(index = index_name, "index already exists");
        } else {
            ensure_success(response, "create index").await?;
            tracing::info!(index = index_name, dimension, "created index");
        }

        self.wait_until_ready(index_name).await
    }

    async fn has_vectors(&self, index_name: &str) -> bool {
        match self.describe_index_stats(index_name).await {
            Ok(stats) => stats.total_vector_count > 0,
            Err(error) => {
                tracing::error!(index = index_name, %error, "error checking index stats");
                false
            }
        }
    }

    async fn upsert(&self, index_name: &str, records: &[VectorRecord]) -> Result<(), SearchError> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id.to_string(),
                    "values": record.values,
                    "metadata": record.metadata.storable(),
                })
            })
            .collect::<Vec<_>>();

        let url = self.data_url(index_name, "vectors/upsert").await?;
        let response = self
            .request(Method::POST, url)
            .json(&self.with_namespace(json!({ "vectors": vectors })))
            .send()
            .await?;
        ensure_success(response, "upsert").await?;
        Ok(())
    }

    async fn query(
        &self,
        index_name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, SearchError> {
        let url = self.data_url(index_name, "query").await?;
        let response = self
            .request(Method::POST, url)
            .json(&self.with_namespace(json!({
                "vector": vector,
                "topK": top_k,
                "includeValues": true,
                "includeMetadata": true,
            })))
            .send()
            .await?;
        let response = ensure_success(response, "query").await?;
        let parsed: QueryResponse = response.json().await?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|hit| ScoredRecord {
                id: hit.id,
                score: hit.score,
                values: hit.values,
                metadata: Metadata::from(hit.metadata.unwrap_or_default()),
            })
            .collect())
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{action} returned {status}: {body}"),
    })
}

fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
