//! Registry backend selection.

use std::sync::Arc;

use tracing::info;

use crate::error::{RegistryError, RegistryResult};
use crate::firestore::{FirestoreClient, FirestoreJobStore};
use crate::memory::MemoryJobStore;
use crate::registry::JobRegistry;
use crate::store::JobStore;

/// Where job snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryBackend {
    /// Process-local; lost on restart
    #[default]
    Memory,
    /// Firestore documents under each user
    Firestore,
}

impl RegistryBackend {
    pub fn parse(raw: &str) -> RegistryResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(Self::Memory),
            "firestore" => Ok(Self::Firestore),
            other => Err(RegistryError::config(format!(
                "unknown REGISTRY_BACKEND {:?} (expected memory or firestore)",
                other
            ))),
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
}

impl RegistryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RegistryResult<Self> {
        let backend = match std::env::var("REGISTRY_BACKEND") {
            Ok(raw) => RegistryBackend::parse(&raw)?,
            Err(_) => RegistryBackend::default(),
        };
        Ok(Self { backend })
    }

    /// Build the configured store.
    pub async fn build_store(&self) -> RegistryResult<Arc<dyn JobStore>> {
        let store: Arc<dyn JobStore> = match self.backend {
            RegistryBackend::Memory => Arc::new(MemoryJobStore::new()),
            RegistryBackend::Firestore => {
                let client = FirestoreClient::from_env().await?;
                Arc::new(FirestoreJobStore::new(client))
            }
        };
        info!(backend = ?self.backend, "Job registry store ready");
        Ok(store)
    }

    /// Build a registry over the configured store.
    pub async fn build_registry(&self) -> RegistryResult<JobRegistry> {
        Ok(JobRegistry::new(self.build_store().await?))
    }
}
