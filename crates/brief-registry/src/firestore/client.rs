//! Firestore REST API client.
//!
//! Only the calls the registry needs: point reads, whole-document upserts
//! and structured queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{info_span, Instrument};

use super::error::{FirestoreError, FirestoreResult};
use super::retry::{with_retry, RetryConfig};
use super::token_cache::{AccessTokenSource, StaticToken, TokenCache};
use super::types::{Document, RunQueryRequest, RunQueryResponse, StructuredQuery, Value};
use crate::metrics::record_firestore_request;

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Scheme and host of the Firestore API (or emulator)
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Config for a project against the public endpoint.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    ///
    /// `FIRESTORE_EMULATOR_HOST` switches the endpoint to the emulator.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to use the Firestore registry",
                )
            })?;

        if project_id.trim().is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let endpoint = match std::env::var("FIRESTORE_EMULATOR_HOST") {
            Ok(host) if !host.trim().is_empty() => format!("http://{}", host.trim()),
            _ => DEFAULT_ENDPOINT.to_string(),
        };

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            endpoint,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }

    fn is_emulator(&self) -> bool {
        self.endpoint != DEFAULT_ENDPOINT
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FirestoreClient {
    /// Create a client with an explicit token source.
    pub fn new(config: FirestoreConfig, tokens: Arc<dyn AccessTokenSource>) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("brief-registry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            config.endpoint.trim_end_matches('/'),
            config.project_id,
            config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            tokens,
        })
    }

    /// Create from environment variables, using the emulator's fixed token
    /// or application default credentials.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        let tokens: Arc<dyn AccessTokenSource> = if config.is_emulator() {
            Arc::new(StaticToken("owner".to_string()))
        } else {
            Arc::new(TokenCache::from_default_credentials().await?)
        };
        Self::new(config, tokens)
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        )
    }

    /// Get a document; `None` if it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = &self.document_url(collection, doc_id);

        with_retry(&self.config.retry, "get_document", move || {
            self.execute_request("get_document", collection, Some(doc_id), async move {
                let response = self.send_authed(|token| self.http.get(url).bearer_auth(token)).await?;
                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(Self::error_from_response(status, url, response).await),
                }
            })
        })
        .await
    }

    /// Create or fully replace a document.
    pub async fn upsert_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = &self.document_url(collection, doc_id);
        let body = &Document::new(fields);

        with_retry(&self.config.retry, "upsert_document", move || {
            self.execute_request("upsert_document", collection, Some(doc_id), async move {
                let response = self
                    .send_authed(|token| self.http.patch(url).bearer_auth(token).json(body))
                    .await?;
                match response.status() {
                    StatusCode::OK => Ok(response.json::<Document>().await?),
                    status => Err(Self::error_from_response(status, url, response).await),
                }
            })
        })
        .await
    }

    /// Run a structured query under `parent_path` (empty for the database
    /// root).
    pub async fn run_query(
        &self,
        parent_path: &str,
        query: StructuredQuery,
    ) -> FirestoreResult<Vec<Document>> {
        let url = &if parent_path.is_empty() {
            format!("{}:runQuery", self.base_url)
        } else {
            format!("{}/{}:runQuery", self.base_url, parent_path)
        };
        let request = &RunQueryRequest {
            structured_query: query,
        };

        with_retry(&self.config.retry, "run_query", move || {
            self.execute_request("run_query", parent_path, None, async move {
                let response = self
                    .send_authed(|token| self.http.post(url).bearer_auth(token).json(request))
                    .await?;
                match response.status() {
                    StatusCode::OK => {
                        let body = response.text().await.unwrap_or_default();
                        let responses: Vec<RunQueryResponse> =
                            serde_json::from_str(&body).map_err(|e| {
                                FirestoreError::InvalidResponse(format!(
                                    "Failed to parse runQuery response: {} (body prefix: {})",
                                    e,
                                    body.chars().take(200).collect::<String>()
                                ))
                            })?;
                        Ok(responses.into_iter().filter_map(|r| r.document).collect())
                    }
                    status => Err(Self::error_from_response(status, url, response).await),
                }
            })
        })
        .await
    }

    /// Send a request, refreshing the token once if Firestore reports it
    /// expired.
    async fn send_authed<F>(&self, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(401, body));
        }

        self.tokens.invalidate().await;
        let token = self.tokens.access_token().await?;
        Ok(build(&token).send().await?)
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = match doc_id {
            Some(id) => info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id),
            None => info_span!("firestore_request", operation = %operation, collection = %collection),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_firestore_request(operation, status, latency_ms);

        result
    }

    async fn error_from_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

fn is_access_token_expired(body: &str) -> bool {
    body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_requires_project() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        assert!(FirestoreConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_config_emulator_endpoint() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert!(config.is_emulator());
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    fn test_token_expiry_detection() {
        assert!(is_access_token_expired(r#"{"error":{"status":"UNAUTHENTICATED"}}"#));
        assert!(!is_access_token_expired(r#"{"error":{"status":"PERMISSION_DENIED"}}"#));
    }
}
