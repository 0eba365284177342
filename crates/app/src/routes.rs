//! HTTP surface.
//!
//! - `POST /bootstrap` starts populating the configured index and returns straight away.
//! - `POST /ingest` runs the bootstrap procedure for `targetIndex` and waits for it.
//! - `POST /search` embeds `query`, re-ranks candidates with MMR and drops duplicates.
//! - `GET /health` is a liveness probe.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use casefile_core::{
    Bootstrapper, Embedder, SearchCoordinator, SearchError, SearchHit, VectorIndex,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const CONNECTION_TIMEOUT_MESSAGE: &str = "Connection timeout. Please try again later.";
pub const BOOTSTRAP_FAILED_MESSAGE: &str = "Bootstrapping failed";
pub const QUERY_REQUIRED_MESSAGE: &str = "Query is required";
pub const SEARCH_FAILED_MESSAGE: &str = "Error performing similarity search";
pub const INGESTION_INITIATED_MESSAGE: &str = "Ingestion initiated";

/// Sends ingestion jobs to another deployment's `/ingest` endpoint.
///
/// The remote `/ingest` answers only once its run is over, so the client carries a connect
/// timeout and no overall request timeout.
#[derive(Clone)]
pub struct IngestForwarder {
    client: reqwest::Client,
    url: String,
}

impl IngestForwarder {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn submit(&self, index_name: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.url)
            .json(&json!({ "targetIndex": index_name }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub struct AppState<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub index_name: String,
    pub bootstrapper: Arc<Bootstrapper<E, V>>,
    pub search: SearchCoordinator<E, V>,
    pub forwarder: Option<IngestForwarder>,
}

pub fn create_router<E, V>(state: Arc<AppState<E, V>>) -> Router
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    Router::new()
        .route("/bootstrap", post(bootstrap::<E, V>))
        .route("/ingest", post(ingest::<E, V>))
        .route("/search", post(search::<E, V>))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn bootstrap<E, V>(
    State(state): State<Arc<AppState<E, V>>>,
) -> Result<Json<MessageResponse>, ApiError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    let index_name = state.index_name.clone();
    match &state.forwarder {
        Some(forwarder) => {
            forwarder.submit(&index_name).await.map_err(|error| {
                tracing::error!(url = %forwarder.url, %error, "failed to forward ingestion job");
                ApiError::Internal(BOOTSTRAP_FAILED_MESSAGE)
            })?;
            tracing::info!(index = %index_name, url = %forwarder.url, "ingestion job forwarded");
        }
        None => {
            let bootstrapper = Arc::clone(&state.bootstrapper);
            tokio::spawn(async move {
                match bootstrapper.run(&index_name).await {
                    Ok(outcome) => tracing::info!(
                        index = %index_name,
                        message = %outcome.message(),
                        "background bootstrap finished"
                    ),
                    Err(error) => {
                        tracing::error!(index = %index_name, %error, "background bootstrap failed")
                    }
                }
            });
        }
    }

    Ok(Json(MessageResponse {
        message: "Bootstrapping initiated".to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    #[serde(default)]
    target_index: Option<String>,
}

async fn ingest<E, V>(
    State(state): State<Arc<AppState<E, V>>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    let index_name = request
        .target_index
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.index_name.clone());

    match state.bootstrapper.run(&index_name).await {
        Ok(outcome) => Ok(Json(json!({
            "message": outcome.message(),
            "outcome": outcome,
        }))),
        Err(error) if error.is_connection_timeout() => {
            tracing::error!(index = %index_name, %error, "connection timeout during bootstrapping");
            Err(ApiError::Internal(CONNECTION_TIMEOUT_MESSAGE))
        }
        Err(error) => {
            tracing::error!(index = %index_name, %error, "error during bootstrapping");
            Ok(Json(json!({ "message": INGESTION_INITIATED_MESSAGE })))
        }
    }
}

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn search<E, V>(
    State(state): State<Arc<AppState<E, V>>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    let query = request.query.unwrap_or_default();
    let results = state.search.search(&query).await.map_err(|error| match error {
        SearchError::EmptyQuery => ApiError::BadRequest(QUERY_REQUIRED_MESSAGE),
        other => {
            tracing::error!(error = %other, "error performing similarity search");
            ApiError::Internal(SEARCH_FAILED_MESSAGE)
        }
    })?;
    Ok(Json(SearchResponse { results }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, PartialEq, Eq)]
enum ApiError {
    BadRequest(&'static str),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
