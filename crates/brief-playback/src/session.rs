//! Playback session.
//!
//! A session binds one surface to at most one live transport. Attaching a
//! new source releases the previous transport before the next is built.

use std::sync::Arc;

use brief_models::MediaLocations;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::acquire::select_source;
use crate::classifier::{classify, ErrorClass, TransportError};
use crate::error::{PlaybackError, PlaybackResult};
use crate::recovery::{PlaybackFailure, RecoveryEngine, RecoveryOutcome};
use crate::surface::{PlaybackSurface, SurfaceEvent};
use crate::transport::{Transport, TransportFactory, TransportKind};

const MIN_RATE: f64 = 0.25;
const MAX_RATE: f64 = 4.0;

/// Events reported to the session owner.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A transport was attached for a new source
    Attached { kind: TransportKind, transport_id: u64 },
    /// A fatal error was classified
    Error { class: ErrorClass, message: String },
    /// Playback of the current source is over
    Terminal(PlaybackFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub transport_kind: Option<TransportKind>,
    pub last_error: Option<(ErrorClass, String)>,
    /// Playhead in seconds
    pub position: f64,
    pub muted: bool,
    pub rate: f64,
    pub fullscreen: bool,
    pub ended: bool,
    /// A terminal failure was reported for the current source
    pub terminal: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            transport_kind: None,
            last_error: None,
            position: 0.0,
            muted: false,
            rate: 1.0,
            fullscreen: false,
            ended: false,
            terminal: false,
        }
    }
}

/// What woke the run loop.
enum Wake {
    Surface(SurfaceEvent),
    Transport(TransportError),
    TransportClosed,
    SurfaceClosed,
}

pub struct PlaybackSession {
    surface: Arc<dyn PlaybackSurface>,
    factory: Arc<dyn TransportFactory>,
    engine: RecoveryEngine,
    transport: Option<Box<dyn Transport>>,
    transport_errors: Option<mpsc::UnboundedReceiver<TransportError>>,
    external_url: Option<String>,
    state: SessionState,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl PlaybackSession {
    pub fn new(
        surface: Arc<dyn PlaybackSurface>,
        factory: Arc<dyn TransportFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            surface,
            factory,
            engine: RecoveryEngine::new(),
            transport: None,
            transport_errors: None,
            external_url: None,
            state: SessionState::default(),
            events,
        };
        (session, rx)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Id of the live transport.
    pub fn transport_id(&self) -> Option<u64> {
        self.transport.as_ref().map(|t| t.id())
    }

    /// Play `locations` on the surface, replacing any current source.
    ///
    /// Fails only when no source is playable. Load failures after that are
    /// reported as events.
    pub async fn attach(&mut self, locations: &MediaLocations) -> PlaybackResult<()> {
        self.release_transport();
        self.state = SessionState {
            muted: self.state.muted,
            rate: self.state.rate,
            fullscreen: self.state.fullscreen,
            ..SessionState::default()
        };
        self.external_url = locations.external_url().map(String::from);

        let plan = select_source(locations, &self.surface.capabilities())?;
        let mut transport = self.factory.create(&plan, Arc::clone(&self.surface))?;
        let kind = transport.kind();
        let transport_id = transport.id();

        info!(transport_id, kind = kind.as_str(), url = %plan.url(), "Attaching source");
        self.transport_errors = transport.take_errors();
        self.state.transport_kind = Some(kind);
        self.emit(PlaybackEvent::Attached { kind, transport_id });

        let started = transport.start_load().await;
        self.transport = Some(transport);
        if let Err(err) = started {
            self.handle_transport_error(err).await;
        }
        Ok(())
    }

    /// Classify and recover from a transport error.
    pub async fn handle_transport_error(&mut self, err: TransportError) {
        if self.state.terminal {
            debug!(error = %err, "Ignoring transport error after terminal failure");
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let class = classify(&err);
        if class != ErrorClass::Recoverable {
            self.state.last_error = Some((class, class.message().to_string()));
            let _ = self.events.send(PlaybackEvent::Error {
                class,
                message: class.message().to_string(),
            });
        }

        let outcome = self
            .engine
            .handle(&err, transport.as_mut(), self.external_url.as_deref())
            .await;
        if let RecoveryOutcome::Terminal(failure) = outcome {
            self.fail(failure);
        }
    }

    /// React to an event from the surface.
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::TimeUpdate(position) => self.track_position(position),
            SurfaceEvent::Seeking(position) => {
                self.state.ended = false;
                self.track_position(position);
            }
            SurfaceEvent::Waiting => debug!(position = self.state.position, "Surface waiting for data"),
            SurfaceEvent::Ended => self.state.ended = true,
            SurfaceEvent::Error(None) => debug!("Surface error event without cause"),
            SurfaceEvent::Error(Some(err)) => {
                if self.state.terminal {
                    return;
                }
                let failure = self.engine.surface_failure(&err, self.external_url.as_deref());
                self.state.last_error = Some((failure.class, failure.message.clone()));
                self.emit(PlaybackEvent::Error {
                    class: failure.class,
                    message: failure.message.clone(),
                });
                self.fail(failure);
            }
        }
    }

    /// Handle transport errors already queued.
    pub async fn pump_transport_errors(&mut self) {
        loop {
            let next = match self.transport_errors.as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            match next {
                Some(err) => self.handle_transport_error(err).await,
                None => return,
            }
        }
    }

    /// Drive the session until the surface event stream closes.
    pub async fn run(&mut self, mut surface_events: mpsc::UnboundedReceiver<SurfaceEvent>) {
        loop {
            let wake = {
                let errors = self.transport_errors.as_mut();
                tokio::select! {
                    event = surface_events.recv() => match event {
                        Some(event) => Wake::Surface(event),
                        None => Wake::SurfaceClosed,
                    },
                    err = next_error(errors) => match err {
                        Some(err) => Wake::Transport(err),
                        None => Wake::TransportClosed,
                    },
                }
            };

            match wake {
                Wake::Surface(event) => self.handle_surface_event(event),
                Wake::Transport(err) => self.handle_transport_error(err).await,
                Wake::TransportClosed => self.transport_errors = None,
                Wake::SurfaceClosed => return,
            }
        }
    }

    pub fn play(&mut self) -> PlaybackResult<()> {
        self.require_transport()?;
        self.surface.play()?;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.surface.pause();
    }

    pub fn seek(&mut self, position: f64) -> PlaybackResult<()> {
        self.require_transport()?;
        let position = position.max(0.0);
        self.surface.seek(position);
        self.state.ended = false;
        self.track_position(position);
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.state.muted = muted;
        self.surface.set_muted(muted);
    }

    /// Set the playback rate, clamped to 0.25..=4.0. Returns the applied rate.
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            1.0
        };
        self.state.rate = rate;
        self.surface.set_rate(rate);
        rate
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) -> PlaybackResult<()> {
        self.surface.set_fullscreen(fullscreen)?;
        self.state.fullscreen = fullscreen;
        Ok(())
    }

    /// Release the transport and clear the source.
    pub fn detach(&mut self) {
        self.release_transport();
        self.external_url = None;
        self.state.position = 0.0;
        self.state.ended = false;
        info!("Playback session detached");
    }

    fn require_transport(&self) -> PlaybackResult<()> {
        if self.transport.is_none() {
            return Err(PlaybackError::Detached);
        }
        Ok(())
    }

    fn track_position(&mut self, position: f64) {
        self.state.position = position;
        if let Some(transport) = &self.transport {
            transport.update_playhead(position);
        }
    }

    fn fail(&mut self, failure: PlaybackFailure) {
        if self.state.terminal {
            return;
        }
        warn!(
            class = failure.class.as_str(),
            message = %failure.message,
            external_url = ?failure.external_url,
            "Playback failed"
        );
        self.state.terminal = true;
        self.emit(PlaybackEvent::Terminal(failure));
        self.release_transport();
    }

    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!(transport_id = transport.id(), "Releasing transport");
            transport.release();
        }
        self.transport_errors = None;
        self.state.transport_kind = None;
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release_transport();
    }
}

async fn next_error(rx: Option<&mut mpsc::UnboundedReceiver<TransportError>>) -> Option<TransportError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
