//! URL handed straight to the surface.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{Transport, TransportKind};
use crate::classifier::{TransportError, TransportErrorKind};
use crate::metrics;
use crate::surface::PlaybackSurface;

pub struct DirectTransport {
    id: u64,
    url: String,
    surface: Arc<dyn PlaybackSurface>,
    errors_rx: Option<mpsc::UnboundedReceiver<TransportError>>,
    _errors_tx: mpsc::UnboundedSender<TransportError>,
    released: bool,
}

impl DirectTransport {
    pub fn new(id: u64, url: String, surface: Arc<dyn PlaybackSurface>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        metrics::transport_created();
        Self {
            id,
            url,
            surface,
            errors_rx: Some(rx),
            _errors_tx: tx,
            released: false,
        }
    }

    fn attach(&self) -> Result<(), TransportError> {
        self.surface
            .attach_url(&self.url)
            .map_err(|e| TransportError::fatal(TransportErrorKind::InternalException, e.to_string()))
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn id(&self) -> u64 {
        self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    async fn start_load(&mut self) -> Result<(), TransportError> {
        if self.released {
            return Err(TransportError::fatal(
                TransportErrorKind::InternalException,
                "transport released",
            ));
        }
        info!(transport_id = self.id, url = %self.url, "Attaching direct source");
        self.attach()
    }

    async fn recover_media(&mut self) -> Result<(), TransportError> {
        if self.released {
            return Err(TransportError::fatal(
                TransportErrorKind::InternalException,
                "transport released",
            ));
        }
        self.surface
            .reset_decoder()
            .map_err(|e| TransportError::fatal(TransportErrorKind::InternalException, e.to_string()))?;
        self.attach()
    }

    fn update_playhead(&self, _position: f64) {}

    fn take_errors(&mut self) -> Option<mpsc::UnboundedReceiver<TransportError>> {
        self.errors_rx.take()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.surface.detach();
        metrics::transport_released();
        debug!(transport_id = self.id, "Released direct transport");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for DirectTransport {
    fn drop(&mut self) {
        self.release();
    }
}
