//! Transports feed a surface from a selected source.
//!
//! A transport is owned by exactly one session. Release stops background
//! loading and resets the surface; dropping a transport releases it.

mod abr;
mod buffer;
mod demux;
mod direct;
mod fetcher;
mod segmented;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::acquire::SourcePlan;
use crate::classifier::TransportError;
use crate::config::BufferConfig;
use crate::error::PlaybackResult;
use crate::surface::PlaybackSurface;

pub use abr::{select_variant, ThroughputEstimator};
pub use buffer::BufferedRanges;
pub use demux::{probe_container, DemuxError};
pub use direct::DirectTransport;
pub use fetcher::{FetchError, HttpSegmentFetcher, SegmentFetcher};
pub use segmented::SegmentedTransport;

/// Transport flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// URL handed to the surface
    Direct,
    /// Segments fetched from a manifest and appended
    Manifest,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Direct => "direct",
            TransportKind::Manifest => "manifest",
        }
    }
}

#[async_trait]
pub trait Transport: Send {
    /// Unique within the factory that created it.
    fn id(&self) -> u64;

    fn kind(&self) -> TransportKind;

    /// Begin, or restart, loading the source.
    async fn start_load(&mut self) -> Result<(), TransportError>;

    /// Reset decoder state on the surface and resume loading.
    async fn recover_media(&mut self) -> Result<(), TransportError>;

    /// Inform the transport of the current playhead, in seconds.
    fn update_playhead(&self, position: f64);

    /// Error stream; available once.
    fn take_errors(&mut self) -> Option<mpsc::UnboundedReceiver<TransportError>>;

    /// Stop loading and detach from the surface. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Builds transports for source plans.
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        plan: &SourcePlan,
        surface: Arc<dyn PlaybackSurface>,
    ) -> PlaybackResult<Box<dyn Transport>>;
}

/// Builds a [`DirectTransport`] or a [`SegmentedTransport`] depending on the plan.
pub struct DefaultTransportFactory {
    fetcher: Arc<dyn SegmentFetcher>,
    config: BufferConfig,
    next_id: AtomicU64,
}

impl DefaultTransportFactory {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, config: BufferConfig) -> Self {
        Self {
            fetcher,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Factory fetching over HTTP with config from the environment.
    pub fn from_env() -> PlaybackResult<Self> {
        let config = BufferConfig::from_env();
        let fetcher = HttpSegmentFetcher::new(config.fetch_timeout)?;
        Ok(Self::new(Arc::new(fetcher), config))
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(
        &self,
        plan: &SourcePlan,
        surface: Arc<dyn PlaybackSurface>,
    ) -> PlaybackResult<Box<dyn Transport>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let transport: Box<dyn Transport> = match plan {
            SourcePlan::Direct { url, .. } => Box::new(DirectTransport::new(id, url.clone(), surface)),
            SourcePlan::Segmented { manifest_url } => Box::new(SegmentedTransport::new(
                id,
                manifest_url.clone(),
                surface,
                Arc::clone(&self.fetcher),
                self.config.clone(),
            )),
        };
        Ok(transport)
    }
}
