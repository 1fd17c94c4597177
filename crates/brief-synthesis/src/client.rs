//! Synthesis provider HTTP client.

use std::time::Instant;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, info_span, Instrument};

use brief_models::{GenerationRequest, JobId, MediaJob};
use brief_registry::JobRegistry;

use crate::cache::TtlCache;
use crate::config::SynthesisConfig;
use crate::error::{SynthesisError, SynthesisResult};
use crate::metrics::{record_cache_hit, record_request};
use crate::types::{CreateVideoRequest, Persona, PersonaList, VideoResponse};

const API_KEY_HEADER: &str = "x-api-key";
const PERSONAS_KEY: &str = "personas";

/// Client for the video synthesis provider.
///
/// Successful submits and status checks are upserted into the registry
/// before returning, so callers always get the registry's view of the job.
pub struct SynthesisClient {
    http: Client,
    config: SynthesisConfig,
    registry: JobRegistry,
    terminal_jobs: TtlCache<JobId, MediaJob>,
    personas: TtlCache<&'static str, Vec<Persona>>,
}

impl SynthesisClient {
    /// Create a new synthesis client.
    pub fn new(config: SynthesisConfig, registry: JobRegistry) -> SynthesisResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("brief-synthesis/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SynthesisError::Network)?;

        Ok(Self {
            http,
            terminal_jobs: TtlCache::new(config.cache_ttl),
            personas: TtlCache::new(config.cache_ttl),
            config,
            registry,
        })
    }

    /// Create from environment variables.
    pub fn from_env(registry: JobRegistry) -> SynthesisResult<Self> {
        Self::new(SynthesisConfig::from_env()?, registry)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Submit a script for rendering.
    ///
    /// The job is registered as `Submitted` whatever status the provider
    /// echoes; later status checks advance it.
    pub async fn submit(&self, request: &GenerationRequest) -> SynthesisResult<MediaJob> {
        request.validate()?;

        let url = format!("{}/videos", self.base_url());
        let name = request.display_name();
        let body = CreateVideoRequest {
            persona_id: request.persona_id.trim(),
            script: request.script.trim(),
            name: &name,
        };

        let response = self
            .execute("submit", self.http.post(&url).json(&body))
            .await?;
        let response = check_status(response, None).await?;
        let video: VideoResponse = parse_body(response).await?;

        let job_id = returned_id(video.video_id.as_deref())?;
        let job = MediaJob::submitted(job_id, request);
        let stored = self.registry.upsert(job).await?.job;

        info!(
            job_id = %stored.id,
            requester_id = %stored.requester_id,
            persona_id = %request.persona_id,
            "Submitted briefing for rendering"
        );
        Ok(stored)
    }

    /// Fetch the current status of a job.
    ///
    /// Finished jobs are served from a local cache for the freshness window.
    pub async fn fetch_status(&self, job_id: &str) -> SynthesisResult<MediaJob> {
        let id = JobId::parse(job_id)
            .map_err(|_| SynthesisError::validation(format!("invalid job id {:?}", job_id)))?;

        if let Some(job) = self.terminal_jobs.get(&id) {
            record_cache_hit("terminal_jobs");
            debug!(job_id = %id, status = %job.status, "Serving finished job from cache");
            return Ok(job);
        }

        let url = format!(
            "{}/videos/{}",
            self.base_url(),
            urlencoding::encode(id.as_str())
        );
        let response = self.execute("fetch_status", self.http.get(&url)).await?;
        let response = check_status(response, Some(&id)).await?;
        let video: VideoResponse = parse_body(response).await?;

        // Status responses may omit the id; an absent field echoes the request.
        let returned = match video.video_id.as_deref() {
            None => id.clone(),
            raw => returned_id(raw)?,
        };
        if returned != id {
            return Err(SynthesisError::protocol(format!(
                "asked for job {} but provider answered for {}",
                id, returned
            )));
        }

        let observation = video.into_observation(returned);
        let stored = self.registry.upsert(observation).await?.job;

        if stored.is_terminal() {
            self.terminal_jobs.insert(id, stored.clone());
        }
        Ok(stored)
    }

    /// Personas offered by the provider.
    pub async fn list_personas(&self) -> SynthesisResult<Vec<Persona>> {
        if let Some(personas) = self.personas.get(&PERSONAS_KEY) {
            record_cache_hit("personas");
            return Ok(personas);
        }

        let url = format!("{}/personas", self.base_url());
        let response = self.execute("list_personas", self.http.get(&url)).await?;
        let response = check_status(response, None).await?;
        let list: PersonaList = parse_body(response).await?;

        self.personas.insert(PERSONAS_KEY, list.personas.clone());
        Ok(list.personas)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Attach credentials and send, with a span and metrics.
    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> SynthesisResult<Response> {
        let span = info_span!("synthesis_request", operation = %operation);
        let start = Instant::now();

        let result = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .instrument(span)
            .await;

        let latency_ms = start.elapsed().as_millis() as f64;
        match &result {
            Ok(response) => record_request(operation, response.status().as_str(), latency_ms),
            Err(_) => record_request(operation, "error", latency_ms),
        }

        Ok(result?)
    }
}

/// Map non-success statuses onto the error taxonomy. `NotFound` only applies
/// to lookups of a specific job.
async fn check_status(response: Response, job_id: Option<&JobId>) -> SynthesisResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(match (status, job_id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => SynthesisError::Auth {
            status: status.as_u16(),
            body,
        },
        (StatusCode::TOO_MANY_REQUESTS, _) => SynthesisError::RateLimited { retry_after_secs },
        (StatusCode::NOT_FOUND, Some(id)) => SynthesisError::NotFound(id.to_string()),
        _ => SynthesisError::Provider {
            status: status.as_u16(),
            body,
        },
    })
}

async fn parse_body<T: serde::de::DeserializeOwned>(response: Response) -> SynthesisResult<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        SynthesisError::protocol(format!(
            "unreadable provider response: {} (body prefix: {})",
            e,
            body.chars().take(200).collect::<String>()
        ))
    })
}

fn returned_id(raw: Option<&str>) -> SynthesisResult<JobId> {
    let raw = raw.unwrap_or_default();
    JobId::parse(raw)
        .map_err(|_| SynthesisError::protocol(format!("provider returned invalid job id {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use brief_models::JobStatus;
    use brief_registry::MemoryJobStore;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        server: MockServer,
        store: Arc<MemoryJobStore>,
        client: SynthesisClient,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryJobStore::new());
        let registry = JobRegistry::new(store.clone());
        let client =
            SynthesisClient::new(SynthesisConfig::new(server.uri(), "test-key"), registry).unwrap();
        Harness {
            server,
            store,
            client,
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("alice", "p1", "Hello")
    }

    #[tokio::test]
    async fn test_submit_registers_submitted_job() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .and(header("x-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({"persona_id": "p1", "script": "Hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"video_id": "v123", "status": "processing"})),
            )
            .expect(1)
            .mount(&h.server)
            .await;

        let job = h.client.submit(&request()).await.unwrap();
        assert_eq!(job.id.as_str(), "v123");
        assert_eq!(job.status, JobStatus::Submitted);

        let stored = h.client.registry().get("v123").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Submitted);
        assert_eq!(stored.requester_id, "alice");
    }

    #[tokio::test]
    async fn test_blank_script_never_reaches_provider() {
        let h = harness().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let req = GenerationRequest::new("alice", "p1", "  \n ");
        let result = h.client.submit(&req).await;
        assert!(matches!(result, Err(SynthesisError::Validation(_))));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unauthorized_submit_writes_nothing() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&h.server)
            .await;

        let result = h.client.submit(&request()).await;
        assert!(matches!(result, Err(SynthesisError::Auth { status: 401, .. })));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_rate_limited_carries_retry_after() {
        let h = harness().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&h.server)
            .await;

        let result = h.client.submit(&request()).await;
        assert!(matches!(
            result,
            Err(SynthesisError::RateLimited {
                retry_after_secs: Some(7)
            })
        ));
    }

    #[tokio::test]
    async fn test_provider_error_keeps_payload() {
        let h = harness().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("{\"detail\":\"boom\"}"))
            .mount(&h.server)
            .await;

        match h.client.submit(&request()).await {
            Err(SynthesisError::Provider { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sentinel_id_from_provider_is_protocol_error() {
        let h = harness().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"video_id": "undefined", "status": "processing"})),
            )
            .mount(&h.server)
            .await;

        let result = h.client.submit(&request()).await;
        assert!(matches!(result, Err(SynthesisError::Protocol(_))));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_rejects_sentinel_ids_locally() {
        let h = harness().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        for bad in ["", "null", "undefined"] {
            assert!(matches!(
                h.client.fetch_status(bad).await,
                Err(SynthesisError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/videos/v404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;

        let result = h.client.fetch_status("v404").await;
        assert!(matches!(result, Err(SynthesisError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_without_id_uses_requested_id() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/videos/v7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ready",
                "stream_url": "https://cdn.example.com/v7/manifest.m3u8"
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/v8"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"video_id": "", "status": "ready"})),
            )
            .mount(&h.server)
            .await;

        let job = h.client.fetch_status("v7").await.unwrap();
        assert_eq!(job.id.as_str(), "v7");
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(
            job.locations.stream_url.as_deref(),
            Some("https://cdn.example.com/v7/manifest.m3u8")
        );

        let err = h.client.fetch_status("v8").await.unwrap_err();
        assert!(matches!(err, SynthesisError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_fetch_mismatched_id_is_protocol_error() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/videos/v1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"video_id": "v2", "status": "ready"})),
            )
            .mount(&h.server)
            .await;

        assert!(matches!(
            h.client.fetch_status("v1").await,
            Err(SynthesisError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_merges_over_registry_and_caches_terminal() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"video_id": "v1", "status": "pending"})),
            )
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "video_id": "v1",
                "status": "completed",
                "stream_url": "https://cdn.example.com/v1/manifest.m3u8"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        h.client.submit(&request()).await.unwrap();
        let first = h.client.fetch_status("v1").await.unwrap();
        let second = h.client.fetch_status("v1").await.unwrap();

        assert_eq!(first.status, JobStatus::Ready);
        assert_eq!(first.requester_id, "alice");
        assert!(first.request.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_personas_are_cached() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/personas"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "personas": [{"persona_id": "p1", "name": "Anchor"}]
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let first = h.client.list_personas().await.unwrap();
        let second = h.client.list_personas().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }
}
