//! End-to-end lifecycle against a mocked provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use brief_lifecycle::{JobController, LifecycleConfig};
use brief_models::{GenerationRequest, JobEvent, JobId, JobStatus, MediaJob};
use brief_registry::{JobRegistry, JobStore, MemoryJobStore, RegistryResult};
use brief_synthesis::{SynthesisClient, SynthesisConfig, SynthesisError};

/// Memory store that remembers every status it was asked to save.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryJobStore,
    saved: Mutex<Vec<JobStatus>>,
}

impl RecordingStore {
    fn saved(&self) -> Vec<JobStatus> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn load(&self, job_id: &JobId) -> RegistryResult<Option<MediaJob>> {
        self.inner.load(job_id).await
    }

    async fn save(&self, job: &MediaJob) -> RegistryResult<()> {
        self.saved.lock().unwrap().push(job.status);
        self.inner.save(job).await
    }

    async fn list_for_requester(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<MediaJob>> {
        self.inner.list_for_requester(requester_id, limit).await
    }
}

fn fast_config() -> LifecycleConfig {
    LifecycleConfig {
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

async fn controller_for(server: &MockServer) -> (JobController, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    let registry = JobRegistry::new(store.clone());
    let client = SynthesisClient::new(SynthesisConfig::new(server.uri(), "test-key"), registry.clone())
        .unwrap();
    let controller = JobController::new(Arc::new(client), registry, fast_config());
    (controller, store)
}

#[tokio::test]
async fn test_submit_then_poll_to_ready() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"video_id": "v123", "status": "processing"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos/v123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "processing"})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos/v123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ready",
            "stream_url": "https://cdn.example.com/v123/manifest.m3u8"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, store) = controller_for(&server).await;
    let request = GenerationRequest::new("alice", "p1", "Hello");
    let mut watch = controller.submit(&request).await.unwrap();

    let mut terminal = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(5), watch.recv())
        .await
        .expect("watch stalled")
    {
        if event.is_terminal() {
            terminal.push(event);
        }
    }

    assert_eq!(terminal.len(), 1);
    match &terminal[0] {
        JobEvent::TerminalSuccess(locations) => assert_eq!(
            locations.stream_url.as_deref(),
            Some("https://cdn.example.com/v123/manifest.m3u8")
        ),
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(
        store.saved(),
        vec![JobStatus::Submitted, JobStatus::Processing, JobStatus::Ready]
    );
}

#[tokio::test]
async fn test_unauthorized_submit_leaves_registry_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (controller, store) = controller_for(&server).await;
    let result = controller
        .submit(&GenerationRequest::new("alice", "p1", "Hello"))
        .await;

    assert!(matches!(result, Err(SynthesisError::Auth { .. })));
    assert!(store.saved().is_empty());
    assert_eq!(controller.active_watches(), 0);
}
