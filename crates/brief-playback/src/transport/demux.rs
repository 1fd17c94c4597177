//! Container sniffing and validation for fetched segments.

use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::surface::{Container, MediaSegment};

const TS_PACKET_LEN: usize = 188;
const TS_SYNC: u8 = 0x47;
const MP4_BOX_TYPES: &[&[u8; 4]] = &[b"ftyp", b"styp", b"moof", b"moov", b"sidx", b"emsg", b"prft"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemuxError {
    #[error("empty segment")]
    Empty,

    #[error("unrecognized container")]
    UnknownContainer,

    #[error("corrupt {container} data at byte {offset}")]
    Corrupt {
        container: &'static str,
        offset: usize,
    },

    #[error("demux worker failed: {0}")]
    Worker(String),
}

/// Where a segment sits in the presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SegmentInfo {
    pub start: f64,
    pub duration: f64,
    pub is_init: bool,
    pub sequence: Option<u64>,
}

/// Identify the container of `data`.
pub fn probe_container(data: &[u8]) -> Option<Container> {
    if data.len() >= TS_PACKET_LEN && data[0] == TS_SYNC {
        let packets = data.len() / TS_PACKET_LEN;
        if (0..packets.min(3)).all(|i| data[i * TS_PACKET_LEN] == TS_SYNC) {
            return Some(Container::MpegTs);
        }
    }

    if data.len() >= 8 && MP4_BOX_TYPES.iter().any(|t| &data[4..8] == t.as_slice()) {
        return Some(Container::Fmp4);
    }

    let audio = skip_id3(data);
    if audio.len() >= 2 && audio[0] == 0xFF && audio[1] & 0xF0 == 0xF0 {
        return Some(Container::Adts);
    }

    None
}

/// Validate a segment and wrap it for appending.
///
/// Runs on a blocking worker when `use_worker` is set and the current runtime
/// is multi-threaded; inline otherwise.
pub(crate) async fn demux(
    data: Vec<u8>,
    info: SegmentInfo,
    use_worker: bool,
) -> Result<MediaSegment, DemuxError> {
    let on_worker = use_worker
        && Handle::try_current()
            .map(|h| h.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);

    if on_worker {
        tokio::task::spawn_blocking(move || demux_blocking(data, info))
            .await
            .map_err(|e| DemuxError::Worker(e.to_string()))?
    } else {
        demux_blocking(data, info)
    }
}

fn demux_blocking(data: Vec<u8>, info: SegmentInfo) -> Result<MediaSegment, DemuxError> {
    if data.is_empty() {
        return Err(DemuxError::Empty);
    }

    let container = probe_container(&data).ok_or(DemuxError::UnknownContainer)?;
    match container {
        Container::MpegTs => check_ts(&data)?,
        Container::Fmp4 => check_mp4_boxes(&data)?,
        Container::Adts => {}
    }

    Ok(MediaSegment {
        data,
        container,
        start: info.start,
        duration: info.duration,
        is_init: info.is_init,
        sequence: info.sequence,
    })
}

fn check_ts(data: &[u8]) -> Result<(), DemuxError> {
    for offset in (0..data.len()).step_by(TS_PACKET_LEN) {
        if data[offset] != TS_SYNC {
            return Err(DemuxError::Corrupt {
                container: Container::MpegTs.as_str(),
                offset,
            });
        }
    }
    Ok(())
}

fn check_mp4_boxes(data: &[u8]) -> Result<(), DemuxError> {
    let corrupt = |offset| DemuxError::Corrupt {
        container: Container::Fmp4.as_str(),
        offset,
    };

    let mut offset = 0usize;
    while offset < data.len() {
        let header = data.get(offset..offset + 8).ok_or_else(|| corrupt(offset))?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;

        let size = match size32 {
            0 => (data.len() - offset) as u64,
            1 => {
                let large = data.get(offset + 8..offset + 16).ok_or_else(|| corrupt(offset))?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(large);
                u64::from_be_bytes(buf)
            }
            n => n,
        };

        if size < 8 || offset as u64 + size > data.len() as u64 {
            return Err(corrupt(offset));
        }
        offset += size as usize;
    }
    Ok(())
}

fn skip_id3(data: &[u8]) -> &[u8] {
    if data.len() >= 10 && &data[0..3] == b"ID3" {
        // Syncsafe size: 7 bits per byte.
        let size = data[6..10]
            .iter()
            .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
        let end = 10 + size;
        if end <= data.len() {
            return &data[end..];
        }
    }
    data
}
