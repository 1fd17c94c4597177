//! Firestore-backed [`JobStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use brief_models::{GenerationRequest, JobId, JobStatus, MediaJob, MediaLocations};

use super::client::FirestoreClient;
use super::types::{Document, StructuredQuery, Value};
use crate::error::{RegistryError, RegistryResult};
use crate::store::JobStore;

/// Collection holding job documents under each user.
pub const JOBS_COLLECTION: &str = "briefing_jobs";

/// Job store over Firestore documents at
/// `users/{requester_id}/briefing_jobs/{job_id}`.
#[derive(Clone)]
pub struct FirestoreJobStore {
    client: FirestoreClient,
}

impl FirestoreJobStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn collection_path(requester_id: &str) -> String {
        format!("users/{}/{}", requester_id, JOBS_COLLECTION)
    }
}

#[async_trait]
impl JobStore for FirestoreJobStore {
    async fn load(&self, job_id: &JobId) -> RegistryResult<Option<MediaJob>> {
        // The owner is not known from the id alone.
        let query = StructuredQuery::collection_group(JOBS_COLLECTION)
            .where_eq("job_id", Value::string(job_id.as_str()))
            .limit(1);

        let docs = self.client.run_query("", query).await?;
        match docs.into_iter().next() {
            Some(doc) => Ok(Some(document_to_job(&doc)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, job: &MediaJob) -> RegistryResult<()> {
        if job.requester_id.trim().is_empty() {
            return Err(RegistryError::store(format!(
                "job {} has no requester and cannot be stored",
                job.id
            )));
        }
        let fields = job_to_fields(job)?;
        self.client
            .upsert_document(&Self::collection_path(&job.requester_id), job.id.as_str(), fields)
            .await?;
        Ok(())
    }

    async fn list_for_requester(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<MediaJob>> {
        let query = StructuredQuery::collection(JOBS_COLLECTION)
            .order_desc("created_at")
            .limit(limit);

        let docs = self
            .client
            .run_query(&format!("users/{}", requester_id), query)
            .await?;

        let mut jobs = Vec::with_capacity(docs.len());
        for doc in &docs {
            match document_to_job(doc) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(
                    document = doc.name.as_deref().unwrap_or("<unnamed>"),
                    "Skipping unreadable job document: {}",
                    e
                ),
            }
        }
        Ok(jobs)
    }
}

fn job_to_fields(job: &MediaJob) -> RegistryResult<HashMap<String, Value>> {
    let mut fields = HashMap::new();
    fields.insert("job_id".to_string(), Value::string(job.id.as_str()));
    fields.insert("requester_id".to_string(), Value::string(&job.requester_id));
    fields.insert("status".to_string(), Value::string(job.status.as_str()));
    fields.insert("name".to_string(), Value::string(&job.name));
    fields.insert("created_at".to_string(), Value::timestamp(job.created_at));
    fields.insert("updated_at".to_string(), Value::timestamp(job.updated_at));
    fields.insert(
        "stream_url".to_string(),
        Value::optional_string(job.locations.stream_url.as_deref()),
    );
    fields.insert(
        "download_url".to_string(),
        Value::optional_string(job.locations.download_url.as_deref()),
    );
    fields.insert(
        "hosted_url".to_string(),
        Value::optional_string(job.locations.hosted_url.as_deref()),
    );
    fields.insert(
        "thumbnail_url".to_string(),
        Value::optional_string(job.thumbnail_url.as_deref()),
    );
    fields.insert("script".to_string(), Value::optional_string(job.script.as_deref()));
    fields.insert(
        "failure_reason".to_string(),
        Value::optional_string(job.failure_reason.as_deref()),
    );

    let request = match &job.request {
        Some(req) => Some(
            serde_json::to_string(req).map_err(|e| RegistryError::Serialization(e.to_string()))?,
        ),
        None => None,
    };
    fields.insert("request".to_string(), Value::optional_string(request.as_deref()));

    Ok(fields)
}

fn document_to_job(doc: &Document) -> RegistryResult<MediaJob> {
    let id = JobId::parse(doc.str_field("job_id").unwrap_or_default())?;

    let status_raw = doc
        .str_field("status")
        .ok_or_else(|| RegistryError::Serialization(format!("job {} has no status", id)))?;
    let status: JobStatus = serde_json::from_value(serde_json::Value::String(status_raw.to_string()))
        .map_err(|e| RegistryError::Serialization(format!("job {}: {}", id, e)))?;

    let request = match doc.str_field("request") {
        Some(raw) => Some(
            serde_json::from_str::<GenerationRequest>(raw)
                .map_err(|e| RegistryError::Serialization(format!("job {}: {}", id, e)))?,
        ),
        None => None,
    };

    let now = Utc::now();
    Ok(MediaJob {
        requester_id: doc.str_field("requester_id").unwrap_or_default().to_string(),
        status,
        name: doc.str_field("name").unwrap_or_default().to_string(),
        created_at: doc.timestamp_field("created_at").unwrap_or(now),
        updated_at: doc.timestamp_field("updated_at").unwrap_or(now),
        locations: MediaLocations {
            stream_url: doc.str_field("stream_url").map(String::from),
            download_url: doc.str_field("download_url").map(String::from),
            hosted_url: doc.str_field("hosted_url").map(String::from),
        },
        thumbnail_url: doc.str_field("thumbnail_url").map(String::from),
        script: doc.str_field("script").map(String::from),
        failure_reason: doc.str_field("failure_reason").map(String::from),
        request,
        id,
    })
}
