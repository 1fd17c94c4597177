//! Segmented HLS transport.
//!
//! Loads a manifest, then runs a background loader that fetches, demuxes
//! and appends segments to the surface while keeping a bounded window of
//! media buffered around the playhead.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::abr::{select_variant, ThroughputEstimator};
use super::buffer::BufferedRanges;
use super::demux::{demux, SegmentInfo};
use super::fetcher::{FetchTarget, SegmentFetcher};
use super::{Transport, TransportKind};
use crate::classifier::{TransportError, TransportErrorKind};
use crate::config::BufferConfig;
use crate::manifest::{parse_playlist, ByteRange, InitSection, MediaPlaylist, Playlist, Variant};
use crate::metrics;
use crate::surface::{PlaybackSurface, SurfaceErrorCode};

/// A manifest resolved down to one media playlist.
#[derive(Debug, Clone)]
struct LoadedStream {
    /// Empty when the manifest was a media playlist
    variants: Vec<Variant>,
    variant: usize,
    playlist_url: String,
    playlist: MediaPlaylist,
}

impl LoadedStream {
    fn bandwidth(&self) -> u64 {
        self.variants.get(self.variant).map(|v| v.bandwidth).unwrap_or(0)
    }
}

struct LoaderHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LoaderHandle {
    fn stop(self) {
        self.token.cancel();
        self.task.abort();
    }
}

pub struct SegmentedTransport {
    id: u64,
    manifest_url: String,
    surface: Arc<dyn PlaybackSurface>,
    fetcher: Arc<dyn SegmentFetcher>,
    config: BufferConfig,
    errors_tx: mpsc::UnboundedSender<TransportError>,
    errors_rx: Option<mpsc::UnboundedReceiver<TransportError>>,
    playhead: watch::Sender<f64>,
    stream: Option<Arc<LoadedStream>>,
    loader: Option<LoaderHandle>,
    attached: bool,
    released: bool,
}

impl SegmentedTransport {
    pub fn new(
        id: u64,
        manifest_url: String,
        surface: Arc<dyn PlaybackSurface>,
        fetcher: Arc<dyn SegmentFetcher>,
        config: BufferConfig,
    ) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (playhead, _) = watch::channel(0.0);
        metrics::transport_created();

        Self {
            id,
            manifest_url,
            surface,
            fetcher,
            config,
            errors_tx,
            errors_rx: Some(errors_rx),
            playhead,
            stream: None,
            loader: None,
            attached: false,
            released: false,
        }
    }

    fn ensure_live(&self) -> Result<(), TransportError> {
        if self.released {
            return Err(TransportError::fatal(
                TransportErrorKind::InternalException,
                "transport released",
            ));
        }
        Ok(())
    }

    fn stop_loader(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.stop();
        }
    }

    fn spawn_loader(&mut self, stream: &LoadedStream) {
        let token = CancellationToken::new();
        let loader = Loader {
            transport_id: self.id,
            surface: Arc::clone(&self.surface),
            fetcher: Arc::clone(&self.fetcher),
            config: self.config.clone(),
            errors: self.errors_tx.clone(),
            playhead: self.playhead.subscribe(),
            token: token.clone(),
            stream: stream.clone(),
            buffered: BufferedRanges::new(),
            next: None,
            skipped: HashSet::new(),
            appended_init: None,
            throughput: ThroughputEstimator::new(),
            append_failures: 0,
        };

        let task = tokio::spawn(loader.run());
        self.loader = Some(LoaderHandle { token, task });
    }

    async fn load_stream(&self) -> Result<LoadedStream, TransportError> {
        let (url, playlist) = fetch_playlist(self.fetcher.as_ref(), &self.manifest_url, FetchTarget::Manifest).await?;

        match playlist {
            Playlist::Media(playlist) => Ok(LoadedStream {
                variants: Vec::new(),
                variant: 0,
                playlist_url: url,
                playlist,
            }),
            Playlist::Master(master) => {
                let variant = select_variant(&master.variants, None, self.config.abr_safety_factor)
                    .ok_or_else(|| {
                        TransportError::fatal(TransportErrorKind::ManifestParsing, "no variants")
                    })?;
                let variant_url = master.variants[variant].uri.clone();
                let (_, level) = fetch_playlist(self.fetcher.as_ref(), &variant_url, FetchTarget::Level).await?;
                let Playlist::Media(playlist) = level else {
                    return Err(TransportError::fatal(
                        TransportErrorKind::ManifestParsing,
                        format!("{} is not a media playlist", variant_url),
                    ));
                };

                Ok(LoadedStream {
                    variants: master.variants,
                    variant,
                    playlist_url: variant_url,
                    playlist,
                })
            }
        }
    }
}

#[async_trait]
impl Transport for SegmentedTransport {
    fn id(&self) -> u64 {
        self.id
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Manifest
    }

    async fn start_load(&mut self) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.stop_loader();

        info!(transport_id = self.id, url = %self.manifest_url, "Loading manifest");
        let stream = self.load_stream().await?;

        if !self.attached {
            self.surface.attach_media_source().map_err(|e| {
                TransportError::fatal(TransportErrorKind::InternalException, e.to_string())
            })?;
            self.attached = true;
        }

        debug!(
            transport_id = self.id,
            segments = stream.playlist.segments.len(),
            bandwidth = stream.bandwidth(),
            "Manifest loaded"
        );
        self.spawn_loader(&stream);
        self.stream = Some(Arc::new(stream));
        Ok(())
    }

    async fn recover_media(&mut self) -> Result<(), TransportError> {
        self.ensure_live()?;
        self.stop_loader();

        info!(transport_id = self.id, "Recovering media decoder");
        self.surface.reset_decoder().map_err(|e| {
            TransportError::fatal(TransportErrorKind::InternalException, e.to_string())
        })?;

        match self.stream.clone() {
            Some(stream) => {
                self.spawn_loader(&stream);
                Ok(())
            }
            None => self.start_load().await,
        }
    }

    fn update_playhead(&self, position: f64) {
        self.playhead.send_replace(position);
    }

    fn take_errors(&mut self) -> Option<mpsc::UnboundedReceiver<TransportError>> {
        self.errors_rx.take()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stop_loader();

        if self.attached {
            if let Err(e) = self.surface.reset_decoder() {
                warn!(transport_id = self.id, error = %e, "Decoder reset failed during release");
            }
            self.surface.detach();
        }

        metrics::transport_released();
        debug!(transport_id = self.id, "Released segmented transport");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for SegmentedTransport {
    fn drop(&mut self) {
        self.release();
    }
}

async fn fetch_playlist(
    fetcher: &dyn SegmentFetcher,
    url: &str,
    target: FetchTarget,
) -> Result<(String, Playlist), TransportError> {
    let text = fetcher
        .fetch_text(url)
        .await
        .map_err(|e| TransportError::fatal(e.kind_for(target), e.to_string()))?;
    let base = Url::parse(url)
        .map_err(|e| TransportError::fatal(TransportErrorKind::ManifestParsing, e.to_string()))?;
    let playlist = parse_playlist(&text, &base)
        .map_err(|e| TransportError::fatal(TransportErrorKind::ManifestParsing, e.to_string()))?;
    Ok((url.to_string(), playlist))
}

/// Slack when deciding whether a segment is already fully buffered.
const BUFFERED_EPSILON: f64 = 0.01;

/// Why the loader stopped waiting.
enum Wake {
    Playhead,
    Refresh,
    Stop,
}

/// Background segment loader. One per transport at a time.
struct Loader {
    transport_id: u64,
    surface: Arc<dyn PlaybackSurface>,
    fetcher: Arc<dyn SegmentFetcher>,
    config: BufferConfig,
    errors: mpsc::UnboundedSender<TransportError>,
    playhead: watch::Receiver<f64>,
    token: CancellationToken,
    stream: LoadedStream,
    buffered: BufferedRanges,
    /// Next segment to load; `None` until anchored
    next: Option<usize>,
    /// Segments dropped after unrecoverable parse errors
    skipped: HashSet<usize>,
    appended_init: Option<InitSection>,
    throughput: ThroughputEstimator,
    append_failures: u32,
}

impl Loader {
    async fn run(mut self) {
        debug!(transport_id = self.transport_id, "Segment loader started");
        while !self.token.is_cancelled() {
            if !self.step().await {
                break;
            }
        }
        debug!(transport_id = self.transport_id, "Segment loader stopped");
    }

    /// One loader iteration. Returns false when loading should stop.
    async fn step(&mut self) -> bool {
        let position = *self.playhead.borrow_and_update();
        self.evict_behind(position);
        let next = self.anchor(position);

        let at_end = next >= self.stream.playlist.segments.len();
        let ahead = self
            .buffered
            .end_of_range_containing(position)
            .map(|end| end - position)
            .unwrap_or(0.0);

        if at_end || ahead >= self.config.forward_buffer_secs {
            let refresh = at_end && !self.stream.playlist.ended;
            return match self.wait(refresh).await {
                Wake::Playhead => true,
                Wake::Refresh => {
                    self.refresh_playlist().await;
                    true
                }
                Wake::Stop => false,
            };
        }

        let segment = self.stream.playlist.segments[next].clone();

        if let Some(init) = &segment.init {
            if self.appended_init.as_ref() != Some(init) {
                if !self.append_init(init).await {
                    return false;
                }
            }
        }

        let Some(data) = self
            .fetch_with_retries(&segment.uri, segment.byte_range, FetchTarget::Fragment)
            .await
        else {
            return false;
        };

        let info = SegmentInfo {
            start: segment.start,
            duration: segment.duration,
            is_init: false,
            sequence: Some(segment.sequence),
        };
        let media = match demux(data, info, self.config.worker_demux).await {
            Ok(media) => media,
            Err(e) => {
                self.emit(TransportError::warning(
                    TransportErrorKind::FragParsing,
                    format!("segment {}: {}", segment.sequence, e),
                ));
                self.skipped.insert(next);
                self.next = Some(next + 1);
                return true;
            }
        };

        if self.token.is_cancelled() {
            return false;
        }

        match self.surface.append_segment(&media) {
            Ok(()) => {
                self.append_failures = 0;
                self.buffered.add(segment.start, segment.end());
                self.next = Some(next + 1);
                metrics::record_segment_appended(self.stream.bandwidth());
                self.maybe_switch_variant(segment.end()).await;
                true
            }
            Err(e) if e.code == SurfaceErrorCode::QuotaExceeded => {
                self.emit(TransportError::warning(TransportErrorKind::BufferFull, e.message));
                self.free_space(position).await
            }
            Err(e) => {
                self.append_failures += 1;
                if self.append_failures > self.config.segment_retries {
                    self.emit(TransportError::fatal(TransportErrorKind::BufferAppend, e.to_string()));
                    return false;
                }
                self.emit(TransportError::warning(TransportErrorKind::BufferAppending, e.to_string()));
                self.pause(self.config.retry_delay).await
            }
        }
    }

    /// Index of the next segment, re-anchoring when the playhead left the
    /// buffered ranges.
    fn anchor(&mut self, position: f64) -> usize {
        let current = self.next;
        if current.is_some() && self.buffered.contains(position) {
            return current.unwrap_or_default();
        }

        let target = match self.stream.playlist.segment_index_at(position) {
            Some(index) => self.first_unloaded(index),
            None => self.stream.playlist.segments.len(),
        };

        if current != Some(target) {
            debug!(
                transport_id = self.transport_id,
                position,
                segment = target,
                "Anchoring loader"
            );
            self.next = Some(target);
        }
        target
    }

    /// First segment from `index` on that is neither skipped nor already
    /// buffered.
    fn first_unloaded(&self, mut index: usize) -> usize {
        let segments = &self.stream.playlist.segments;
        while let Some(segment) = segments.get(index) {
            let buffered = self
                .buffered
                .end_of_range_containing(segment.start)
                .is_some_and(|end| end >= segment.end() - BUFFERED_EPSILON);
            if !buffered && !self.skipped.contains(&index) {
                break;
            }
            index += 1;
        }
        index
    }

    fn evict_behind(&mut self, position: f64) {
        let cutoff = position - self.config.back_buffer_secs;
        match self.buffered.start() {
            Some(start) if cutoff > start => {
                if let Err(e) = self.surface.evict(start, cutoff) {
                    warn!(transport_id = self.transport_id, error = %e, "Eviction failed");
                    return;
                }
                self.buffered.remove_before(cutoff);
            }
            _ => {}
        }
    }

    /// Make room after a quota error by dropping everything behind the
    /// playhead, or wait for the playhead when there is nothing to drop.
    async fn free_space(&mut self, position: f64) -> bool {
        match self.buffered.start() {
            Some(start) if start < position => {
                if let Err(e) = self.surface.evict(start, position) {
                    warn!(transport_id = self.transport_id, error = %e, "Eviction failed");
                }
                self.buffered.remove_before(position);
                true
            }
            _ => !matches!(self.wait(false).await, Wake::Stop),
        }
    }

    async fn append_init(&mut self, init: &InitSection) -> bool {
        let Some(data) = self
            .fetch_with_retries(&init.uri, init.byte_range, FetchTarget::Fragment)
            .await
        else {
            return false;
        };

        let info = SegmentInfo {
            start: 0.0,
            duration: 0.0,
            is_init: true,
            sequence: None,
        };
        let result = match demux(data, info, self.config.worker_demux).await {
            Ok(media) => self.surface.append_segment(&media).map_err(|e| {
                TransportError::fatal(TransportErrorKind::BufferAppend, e.to_string())
            }),
            Err(e) => Err(TransportError::fatal(
                TransportErrorKind::FragParsing,
                format!("init section: {}", e),
            )),
        };

        match result {
            Ok(()) => {
                self.appended_init = Some(init.clone());
                true
            }
            Err(err) => {
                self.emit(err);
                false
            }
        }
    }

    /// Fetch with internal retries. `None` means the loader must stop; a
    /// fatal error has been emitted unless it was cancelled.
    async fn fetch_with_retries(
        &mut self,
        url: &str,
        range: Option<ByteRange>,
        target: FetchTarget,
    ) -> Option<Vec<u8>> {
        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            let result = tokio::select! {
                _ = self.token.cancelled() => return None,
                result = self.fetcher.fetch_bytes(url, range) => result,
            };

            match result {
                Ok(data) => {
                    self.throughput.record(data.len(), started.elapsed());
                    return Some(data);
                }
                Err(e) if attempt < self.config.segment_retries => {
                    attempt += 1;
                    metrics::record_segment_retry();
                    self.emit(TransportError::warning(e.kind_for(target), e.to_string()));

                    let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                    if !self.pause(delay).await {
                        return None;
                    }
                }
                Err(e) => {
                    self.emit(TransportError::fatal(
                        e.kind_for(target),
                        format!("{} (after {} retries)", e, attempt),
                    ));
                    return None;
                }
            }
        }
    }

    /// Switch to the variant the throughput estimate supports.
    async fn maybe_switch_variant(&mut self, resume_at: f64) {
        if self.stream.variants.len() < 2 {
            return;
        }
        let Some(target) = select_variant(
            &self.stream.variants,
            self.throughput.estimate(),
            self.config.abr_safety_factor,
        ) else {
            return;
        };
        if target == self.stream.variant {
            return;
        }

        let url = self.stream.variants[target].uri.clone();
        let playlist = match fetch_playlist(self.fetcher.as_ref(), &url, FetchTarget::Level).await {
            Ok((_, Playlist::Media(playlist))) => playlist,
            Ok(_) => {
                self.emit(TransportError::warning(
                    TransportErrorKind::LevelLoad,
                    format!("{} is not a media playlist", url),
                ));
                return;
            }
            Err(e) => {
                self.emit(TransportError::warning(e.kind, e.details));
                return;
            }
        };

        info!(
            transport_id = self.transport_id,
            from = self.stream.bandwidth(),
            to = self.stream.variants[target].bandwidth,
            "Switching variant"
        );
        let resume = playlist
            .segment_index_at(resume_at)
            .unwrap_or(playlist.segments.len());
        self.stream.variant = target;
        self.stream.playlist_url = url;
        self.stream.playlist = playlist;
        self.skipped.clear();
        self.next = Some(self.first_unloaded(resume));
    }

    async fn refresh_playlist(&mut self) {
        let url = self.stream.playlist_url.clone();
        match fetch_playlist(self.fetcher.as_ref(), &url, FetchTarget::Level).await {
            Ok((_, Playlist::Media(playlist))) => self.stream.playlist = playlist,
            Ok(_) => {}
            Err(e) => self.emit(TransportError::warning(e.kind, e.details)),
        }
    }

    async fn wait(&mut self, refresh: bool) -> Wake {
        let refresh_after = Duration::from_secs(self.stream.playlist.target_duration.max(1));
        tokio::select! {
            _ = self.token.cancelled() => Wake::Stop,
            changed = self.playhead.changed() => match changed {
                Ok(()) => Wake::Playhead,
                Err(_) => Wake::Stop,
            },
            _ = tokio::time::sleep(refresh_after), if refresh => Wake::Refresh,
        }
    }

    /// Sleep unless cancelled. Returns false when cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn emit(&self, err: TransportError) {
        if err.fatal {
            warn!(transport_id = self.transport_id, error = %err, "Segment loader failed");
        } else {
            debug!(transport_id = self.transport_id, error = %err, "Segment loader warning");
        }
        let _ = self.errors.send(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MediaSegment, SurfaceCapabilities, SurfaceError};
    use crate::transport::demux::tests::{mp4_box, ts_bytes};
    use crate::transport::FetchError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BASE: &str = "https://cdn.example.com/v1";

    #[derive(Default)]
    struct MemoryFetcher {
        resources: Mutex<HashMap<String, Vec<u8>>>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        fn with(self, name: &str, data: impl Into<Vec<u8>>) -> Self {
            self.resources
                .lock()
                .unwrap()
                .insert(format!("{}/{}", BASE, name), data.into());
            self
        }

        fn requests_for(&self, name: &str) -> usize {
            let url = format!("{}/{}", BASE, name);
            self.requests.lock().unwrap().iter().filter(|u| **u == url).count()
        }

        fn lookup(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.resources
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[async_trait]
    impl SegmentFetcher for MemoryFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.lookup(url).map(|b| String::from_utf8_lossy(&b).into_owned())
        }

        async fn fetch_bytes(&self, url: &str, _range: Option<ByteRange>) -> Result<Vec<u8>, FetchError> {
            self.lookup(url)
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        appended: Mutex<Vec<MediaSegment>>,
        evictions: Mutex<Vec<(f64, f64)>>,
        resets: Mutex<u32>,
        detaches: Mutex<u32>,
        media_source_attaches: Mutex<u32>,
    }

    impl RecordingSurface {
        fn appended_starts(&self) -> Vec<f64> {
            self.appended
                .lock()
                .unwrap()
                .iter()
                .filter(|s| !s.is_init)
                .map(|s| s.start)
                .collect()
        }
    }

    impl PlaybackSurface for RecordingSurface {
        fn capabilities(&self) -> SurfaceCapabilities {
            SurfaceCapabilities {
                native_hls: false,
                media_source: true,
            }
        }
        fn attach_url(&self, _url: &str) -> Result<(), SurfaceError> {
            Ok(())
        }
        fn attach_media_source(&self) -> Result<(), SurfaceError> {
            *self.media_source_attaches.lock().unwrap() += 1;
            Ok(())
        }
        fn append_segment(&self, segment: &MediaSegment) -> Result<(), SurfaceError> {
            self.appended.lock().unwrap().push(segment.clone());
            Ok(())
        }
        fn evict(&self, start: f64, end: f64) -> Result<(), SurfaceError> {
            self.evictions.lock().unwrap().push((start, end));
            Ok(())
        }
        fn reset_decoder(&self) -> Result<(), SurfaceError> {
            *self.resets.lock().unwrap() += 1;
            Ok(())
        }
        fn detach(&self) {
            *self.detaches.lock().unwrap() += 1;
        }
        fn play(&self) -> Result<(), SurfaceError> {
            Ok(())
        }
        fn pause(&self) {}
        fn seek(&self, _position: f64) {}
        fn set_muted(&self, _muted: bool) {}
        fn set_rate(&self, _rate: f64) {}
        fn set_fullscreen(&self, _fullscreen: bool) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    fn media_playlist(segments: usize) -> String {
        let mut text = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXT-X-PLAYLIST-TYPE:VOD\n");
        for i in 0..segments {
            text.push_str(&format!("#EXTINF:6.0,\nseg{}.ts\n", i));
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    fn fetcher_with_segments(segments: usize) -> MemoryFetcher {
        let mut fetcher = MemoryFetcher::default().with("index.m3u8", media_playlist(segments));
        for i in 0..segments {
            fetcher = fetcher.with(&format!("seg{}.ts", i), ts_bytes(2));
        }
        fetcher
    }

    fn config() -> BufferConfig {
        BufferConfig {
            forward_buffer_secs: 100.0,
            back_buffer_secs: 90.0,
            worker_demux: true,
            segment_retries: 2,
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn transport(
        fetcher: Arc<MemoryFetcher>,
        surface: Arc<RecordingSurface>,
        config: BufferConfig,
    ) -> SegmentedTransport {
        SegmentedTransport::new(1, format!("{}/index.m3u8", BASE), surface, fetcher, config)
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_loads_all_segments_in_order() {
        let fetcher = Arc::new(fetcher_with_segments(3));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher, surface.clone(), config());

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 3).await;

        assert_eq!(surface.appended_starts(), vec![0.0, 6.0, 12.0]);
        assert_eq!(*surface.media_source_attaches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_forward_buffer_limits_loading() {
        let fetcher = Arc::new(fetcher_with_segments(4));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(
            fetcher.clone(),
            surface.clone(),
            BufferConfig {
                forward_buffer_secs: 10.0,
                ..config()
            },
        );

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(surface.appended_starts().len(), 2);
        assert_eq!(fetcher.requests_for("seg2.ts"), 0);

        transport.update_playhead(7.0);
        wait_for(|| surface.appended_starts().len() == 3).await;
        assert_eq!(surface.appended_starts(), vec![0.0, 6.0, 12.0]);
    }

    #[tokio::test]
    async fn test_back_buffer_eviction() {
        let fetcher = Arc::new(fetcher_with_segments(3));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(
            fetcher,
            surface.clone(),
            BufferConfig {
                back_buffer_secs: 5.0,
                ..config()
            },
        );

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 3).await;

        transport.update_playhead(13.0);
        wait_for(|| !surface.evictions.lock().unwrap().is_empty()).await;
        assert_eq!(surface.evictions.lock().unwrap()[0], (0.0, 8.0));
    }

    #[tokio::test]
    async fn test_seek_outside_buffer_reanchors() {
        let fetcher = Arc::new(fetcher_with_segments(6));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(
            fetcher.clone(),
            surface.clone(),
            BufferConfig {
                forward_buffer_secs: 6.0,
                ..config()
            },
        );

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 1).await;

        transport.update_playhead(25.0);
        wait_for(|| surface.appended_starts().contains(&24.0)).await;
        assert_eq!(fetcher.requests_for("seg1.ts"), 0);
    }

    #[tokio::test]
    async fn test_playhead_at_stream_end_stops_fetching() {
        let fetcher = Arc::new(fetcher_with_segments(2));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher.clone(), surface.clone(), config());

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 2).await;

        transport.update_playhead(12.0);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(fetcher.requests_for("seg1.ts"), 1);
        assert_eq!(surface.appended_starts(), vec![0.0, 6.0]);
    }

    #[tokio::test]
    async fn test_seek_past_end_waits_then_resumes() {
        let fetcher = Arc::new(fetcher_with_segments(3));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(
            fetcher.clone(),
            surface.clone(),
            BufferConfig {
                forward_buffer_secs: 6.0,
                ..config()
            },
        );

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 1).await;

        transport.update_playhead(40.0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fetcher.requests_for("seg1.ts"), 0);
        assert_eq!(fetcher.requests_for("seg2.ts"), 0);
        assert_eq!(surface.appended_starts(), vec![0.0]);

        transport.update_playhead(6.5);
        wait_for(|| surface.appended_starts().len() == 3).await;
        assert_eq!(surface.appended_starts(), vec![0.0, 6.0, 12.0]);
        assert_eq!(fetcher.requests_for("seg1.ts"), 1);
    }

    #[tokio::test]
    async fn test_variant_switch_after_last_segment_does_not_refetch() {
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=5000000\n\
            high/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=600000\n\
            low/index.m3u8\n";
        let level = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6,\nseg0.ts\n#EXT-X-ENDLIST\n";

        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with("index.m3u8", master)
                .with("low/index.m3u8", level)
                .with("high/index.m3u8", level)
                .with("low/seg0.ts", ts_bytes(6000))
                .with("high/seg0.ts", ts_bytes(2)),
        );
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher.clone(), surface.clone(), config());

        transport.start_load().await.unwrap();
        wait_for(|| fetcher.requests_for("high/index.m3u8") == 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(fetcher.requests_for("high/seg0.ts"), 0);
        assert_eq!(surface.appended_starts(), vec![0.0]);
    }

    #[tokio::test]
    async fn test_fetch_retries_then_fatal() {
        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with("index.m3u8", media_playlist(2))
                .with("seg0.ts", ts_bytes(2)),
        );
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher.clone(), surface, config());
        let mut errors = transport.take_errors().unwrap();
        assert!(transport.take_errors().is_none());

        transport.start_load().await.unwrap();

        let first = errors.recv().await.unwrap();
        let second = errors.recv().await.unwrap();
        let last = errors.recv().await.unwrap();
        assert!(!first.fatal && !second.fatal);
        assert_eq!(first.kind, TransportErrorKind::FragLoad);
        assert!(last.fatal);
        assert_eq!(last.kind, TransportErrorKind::FragLoad);
        assert_eq!(fetcher.requests_for("seg1.ts"), 3);
    }

    #[tokio::test]
    async fn test_corrupt_segment_is_skipped() {
        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with("index.m3u8", media_playlist(3))
                .with("seg0.ts", ts_bytes(2))
                .with("seg1.ts", b"not media".to_vec())
                .with("seg2.ts", ts_bytes(2)),
        );
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher, surface.clone(), config());
        let mut errors = transport.take_errors().unwrap();

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 2).await;

        assert_eq!(surface.appended_starts(), vec![0.0, 12.0]);
        let warning = errors.recv().await.unwrap();
        assert_eq!(warning.kind, TransportErrorKind::FragParsing);
        assert!(!warning.fatal);
    }

    #[tokio::test]
    async fn test_master_playlist_starts_on_lowest_variant_with_init() {
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=5000000\n\
            high/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=600000\n\
            low/index.m3u8\n";
        let low = "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXT-X-MAP:URI=\"init.mp4\"\n\
            #EXTINF:4,\nseg0.m4s\n#EXT-X-ENDLIST\n";
        let mut segment = mp4_box(b"moof", 8);
        segment.extend(mp4_box(b"mdat", 16));

        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with("index.m3u8", master)
                .with("low/index.m3u8", low)
                .with("low/init.mp4", mp4_box(b"ftyp", 8))
                .with("low/seg0.m4s", segment),
        );
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher.clone(), surface.clone(), config());

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended.lock().unwrap().len() == 2).await;

        let appended = surface.appended.lock().unwrap();
        assert!(appended[0].is_init);
        assert!(!appended[1].is_init);
        assert_eq!(fetcher.requests_for("high/index.m3u8"), 0);
    }

    #[tokio::test]
    async fn test_manifest_failure_is_returned() {
        let fetcher = Arc::new(MemoryFetcher::default());
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher, surface.clone(), config());

        let err = transport.start_load().await.unwrap_err();
        assert!(err.fatal);
        assert_eq!(err.kind, TransportErrorKind::ManifestLoad);
        assert_eq!(*surface.media_source_attaches.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_stops_loading_and_resets_surface() {
        let fetcher = Arc::new(fetcher_with_segments(4));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(
            fetcher.clone(),
            surface.clone(),
            BufferConfig {
                forward_buffer_secs: 6.0,
                ..config()
            },
        );

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 1).await;

        transport.release();
        transport.release();
        assert!(transport.is_released());
        assert_eq!(*surface.resets.lock().unwrap(), 1);
        assert_eq!(*surface.detaches.lock().unwrap(), 1);

        transport.update_playhead(5.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(surface.appended_starts().len(), 1);
        assert!(transport.start_load().await.is_err());
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let fetcher = Arc::new(fetcher_with_segments(1));
        let surface = Arc::new(RecordingSurface::default());
        {
            let mut transport = transport(fetcher, surface.clone(), config());
            transport.start_load().await.unwrap();
        }
        assert_eq!(*surface.detaches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recover_media_resets_and_reloads() {
        let fetcher = Arc::new(fetcher_with_segments(2));
        let surface = Arc::new(RecordingSurface::default());
        let mut transport = transport(fetcher.clone(), surface.clone(), config());

        transport.start_load().await.unwrap();
        wait_for(|| surface.appended_starts().len() == 2).await;

        transport.recover_media().await.unwrap();
        assert_eq!(*surface.resets.lock().unwrap(), 1);
        wait_for(|| surface.appended_starts().len() == 4).await;
        assert_eq!(fetcher.requests_for("index.m3u8"), 1);
    }
}
