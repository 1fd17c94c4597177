//! HLS playlist parsing.

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("playlist does not start with #EXTM3U")]
    MissingHeader,

    #[error("line {line}: invalid {tag}: {reason}")]
    InvalidTag {
        line: usize,
        tag: &'static str,
        reason: String,
    },

    #[error("line {line}: cannot resolve URI {uri:?}: {reason}")]
    InvalidUri {
        line: usize,
        uri: String,
        reason: String,
    },

    #[error("playlist has no variants or segments")]
    Empty,
}

/// A parsed playlist.
#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

/// One rendition listed in a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Absolute URI of the media playlist
    pub uri: String,
    /// Peak bits per second
    pub bandwidth: u64,
    pub resolution: Option<(u32, u32)>,
    pub codecs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPlaylist {
    pub variants: Vec<Variant>,
}

impl MasterPlaylist {
    /// Variant with the lowest bandwidth.
    pub fn lowest(&self) -> Option<&Variant> {
        self.variants.iter().min_by_key(|v| v.bandwidth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
}

/// Byte range within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub length: u64,
    pub offset: u64,
}

impl ByteRange {
    /// Value for an HTTP `Range` header.
    pub fn header_value(&self) -> String {
        let last = self.offset + self.length.saturating_sub(1);
        format!("bytes={}-{}", self.offset, last)
    }
}

/// Initialization section (`#EXT-X-MAP`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSection {
    pub uri: String,
    pub byte_range: Option<ByteRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub sequence: u64,
    pub uri: String,
    pub duration: f64,
    /// Start time from the beginning of the playlist, in seconds
    pub start: f64,
    pub byte_range: Option<ByteRange>,
    pub discontinuity: bool,
    /// Initialization section in effect for this segment
    pub init: Option<InitSection>,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub target_duration: u64,
    pub media_sequence: u64,
    pub playlist_type: Option<PlaylistType>,
    pub segments: Vec<Segment>,
    pub ended: bool,
}

impl MediaPlaylist {
    pub fn total_duration(&self) -> f64 {
        self.segments.last().map(Segment::end).unwrap_or(0.0)
    }

    /// Index of the segment covering `position`. `None` at or past the end
    /// of the last segment.
    pub fn segment_index_at(&self, position: f64) -> Option<usize> {
        if self.segments.is_empty() {
            return None;
        }
        if position <= 0.0 {
            return Some(0);
        }
        let idx = self.segments.partition_point(|s| s.end() <= position);
        (idx < self.segments.len()).then_some(idx)
    }
}

/// Parse a playlist, resolving URIs against `base`.
pub fn parse_playlist(text: &str, base: &Url) -> Result<Playlist, ManifestError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    match lines.find(|(_, l)| !l.is_empty()) {
        Some((_, "#EXTM3U")) => {}
        _ => return Err(ManifestError::MissingHeader),
    }

    let lines: Vec<(usize, &str)> = lines.filter(|(_, l)| !l.is_empty()).collect();
    if lines.iter().any(|(_, l)| l.starts_with("#EXT-X-STREAM-INF:")) {
        parse_master(&lines, base).map(Playlist::Master)
    } else {
        parse_media(&lines, base).map(Playlist::Media)
    }
}

fn parse_master(lines: &[(usize, &str)], base: &Url) -> Result<MasterPlaylist, ManifestError> {
    let mut variants = Vec::new();
    let mut pending: Option<(usize, Vec<(String, String)>)> = None;

    for &(line, text) in lines {
        if let Some(attrs) = text.strip_prefix("#EXT-X-STREAM-INF:") {
            pending = Some((line, parse_attributes(attrs)));
        } else if text.starts_with('#') {
            continue;
        } else if let Some((tag_line, attrs)) = pending.take() {
            let bandwidth = attr(&attrs, "BANDWIDTH")
                .ok_or_else(|| invalid(tag_line, "EXT-X-STREAM-INF", "missing BANDWIDTH"))?
                .parse::<u64>()
                .map_err(|e| invalid(tag_line, "EXT-X-STREAM-INF", e.to_string()))?;
            let resolution = attr(&attrs, "RESOLUTION").and_then(|r| {
                let (w, h) = r.split_once('x')?;
                Some((w.parse().ok()?, h.parse().ok()?))
            });

            variants.push(Variant {
                uri: resolve(base, text, line)?,
                bandwidth,
                resolution,
                codecs: attr(&attrs, "CODECS").map(String::from),
            });
        }
    }

    if variants.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(MasterPlaylist { variants })
}

fn parse_media(lines: &[(usize, &str)], base: &Url) -> Result<MediaPlaylist, ManifestError> {
    let mut playlist = MediaPlaylist {
        target_duration: 0,
        media_sequence: 0,
        playlist_type: None,
        segments: Vec::new(),
        ended: false,
    };

    let mut duration: Option<f64> = None;
    let mut byte_range: Option<(u64, Option<u64>)> = None;
    let mut discontinuity = false;
    let mut init: Option<InitSection> = None;
    let mut previous_end: Option<(String, u64)> = None;
    let mut start = 0.0;

    for &(line, text) in lines {
        if let Some(v) = text.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration = v
                .parse()
                .map_err(|_| invalid(line, "EXT-X-TARGETDURATION", v.to_string()))?;
        } else if let Some(v) = text.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            playlist.media_sequence = v
                .parse()
                .map_err(|_| invalid(line, "EXT-X-MEDIA-SEQUENCE", v.to_string()))?;
        } else if let Some(v) = text.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
            playlist.playlist_type = match v {
                "VOD" => Some(PlaylistType::Vod),
                "EVENT" => Some(PlaylistType::Event),
                other => return Err(invalid(line, "EXT-X-PLAYLIST-TYPE", other.to_string())),
            };
        } else if let Some(v) = text.strip_prefix("#EXT-X-MAP:") {
            let attrs = parse_attributes(v);
            let uri = attr(&attrs, "URI").ok_or_else(|| invalid(line, "EXT-X-MAP", "missing URI"))?;
            let range = match attr(&attrs, "BYTERANGE") {
                Some(r) => {
                    let (length, offset) = parse_raw_byte_range(r).ok_or_else(|| {
                        invalid(line, "EXT-X-MAP", format!("bad BYTERANGE {:?}", r))
                    })?;
                    Some(ByteRange {
                        length,
                        offset: offset.unwrap_or(0),
                    })
                }
                None => None,
            };
            init = Some(InitSection {
                uri: resolve(base, uri, line)?,
                byte_range: range,
            });
        } else if let Some(v) = text.strip_prefix("#EXTINF:") {
            let secs = v.split(',').next().unwrap_or_default().trim();
            let parsed = secs
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| invalid(line, "EXTINF", secs.to_string()))?;
            duration = Some(parsed);
        } else if let Some(v) = text.strip_prefix("#EXT-X-BYTERANGE:") {
            byte_range = Some(
                parse_raw_byte_range(v).ok_or_else(|| invalid(line, "EXT-X-BYTERANGE", v.to_string()))?,
            );
        } else if text == "#EXT-X-DISCONTINUITY" {
            discontinuity = true;
        } else if text == "#EXT-X-ENDLIST" {
            playlist.ended = true;
        } else if text.starts_with('#') {
            continue;
        } else {
            let seg_duration =
                duration.take().ok_or_else(|| invalid(line, "EXTINF", "segment URI without #EXTINF"))?;
            let uri = resolve(base, text, line)?;

            // A BYTERANGE without an offset continues from the previous
            // range of the same resource.
            let range = byte_range.take().map(|(length, offset)| {
                let offset = offset.unwrap_or_else(|| match &previous_end {
                    Some((prev_uri, end)) if prev_uri == &uri => *end,
                    _ => 0,
                });
                ByteRange { length, offset }
            });
            previous_end = range.map(|r| (uri.clone(), r.offset + r.length));

            let sequence = playlist.media_sequence + playlist.segments.len() as u64;
            playlist.segments.push(Segment {
                sequence,
                uri,
                duration: seg_duration,
                start,
                byte_range: range,
                discontinuity: std::mem::take(&mut discontinuity),
                init: init.clone(),
            });
            start += seg_duration;
        }
    }

    if playlist.segments.is_empty() {
        return Err(ManifestError::Empty);
    }
    Ok(playlist)
}

/// `<length>[@<offset>]`
fn parse_raw_byte_range(raw: &str) -> Option<(u64, Option<u64>)> {
    let raw = raw.trim().trim_matches('"');
    match raw.split_once('@') {
        Some((l, o)) => Some((l.parse().ok()?, Some(o.parse().ok()?))),
        None => Some((raw.parse().ok()?, None)),
    }
}

/// Parse an attribute list, honoring quoted values that contain commas.
fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = raw.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], quoted[end + 1..].trim_start_matches(',')),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end + 1..]),
                None => (after, ""),
            }
        };
        out.push((key.trim().to_string(), value.to_string()));
        rest = remaining.trim();
    }

    out
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn resolve(base: &Url, uri: &str, line: usize) -> Result<String, ManifestError> {
    base.join(uri)
        .map(|u| u.to_string())
        .map_err(|e| ManifestError::InvalidUri {
            line,
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}

fn invalid(line: usize, tag: &'static str, reason: impl Into<String>) -> ManifestError {
    ManifestError::InvalidTag {
        line,
        tag,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cdn.example.com/videos/v1/master.m3u8").unwrap()
    }

    #[test]
    fn test_parse_master() {
        let text = "#EXTM3U\n\
            #EXT-X-VERSION:6\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"\n\
            360p/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n\
            https://other.example.com/720p.m3u8\n";

        let Playlist::Master(master) = parse_playlist(text, &base()).unwrap() else {
            panic!("expected master playlist");
        };
        assert_eq!(master.variants.len(), 2);
        assert_eq!(
            master.variants[0].uri,
            "https://cdn.example.com/videos/v1/360p/index.m3u8"
        );
        assert_eq!(master.variants[0].resolution, Some((640, 360)));
        assert_eq!(
            master.variants[0].codecs.as_deref(),
            Some("avc1.4d401e,mp4a.40.2")
        );
        assert_eq!(master.variants[1].uri, "https://other.example.com/720p.m3u8");
        assert_eq!(master.lowest().unwrap().bandwidth, 800_000);
    }

    #[test]
    fn test_parse_media() {
        let text = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:6\n\
            #EXT-X-MEDIA-SEQUENCE:3\n\
            #EXT-X-PLAYLIST-TYPE:VOD\n\
            #EXT-X-MAP:URI=\"init.mp4\"\n\
            #EXTINF:6.0,\n\
            seg0.m4s\n\
            #EXTINF:6.0,\n\
            seg1.m4s\n\
            #EXT-X-DISCONTINUITY\n\
            #EXTINF:4.5,tail\n\
            seg2.m4s\n\
            #EXT-X-ENDLIST\n";

        let Playlist::Media(media) = parse_playlist(text, &base()).unwrap() else {
            panic!("expected media playlist");
        };
        assert_eq!(media.target_duration, 6);
        assert_eq!(media.playlist_type, Some(PlaylistType::Vod));
        assert!(media.ended);
        assert_eq!(media.segments.len(), 3);
        assert_eq!(media.segments[0].sequence, 3);
        assert_eq!(media.segments[2].start, 12.0);
        assert!(media.segments[2].discontinuity);
        assert!(!media.segments[1].discontinuity);
        assert_eq!(
            media.segments[0].init.as_ref().unwrap().uri,
            "https://cdn.example.com/videos/v1/init.mp4"
        );
        assert_eq!(media.total_duration(), 16.5);
    }

    #[test]
    fn test_byte_ranges_continue() {
        let text = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:4\n\
            #EXTINF:4,\n\
            #EXT-X-BYTERANGE:1000@0\n\
            all.ts\n\
            #EXTINF:4,\n\
            #EXT-X-BYTERANGE:500\n\
            all.ts\n";

        let Playlist::Media(media) = parse_playlist(text, &base()).unwrap() else {
            panic!("expected media playlist");
        };
        assert_eq!(
            media.segments[0].byte_range,
            Some(ByteRange { length: 1000, offset: 0 })
        );
        assert_eq!(
            media.segments[1].byte_range,
            Some(ByteRange { length: 500, offset: 1000 })
        );
        assert_eq!(media.segments[1].byte_range.unwrap().header_value(), "bytes=1000-1499");
    }

    #[test]
    fn test_segment_index_at() {
        let text = "#EXTM3U\n#EXTINF:6,\na.ts\n#EXTINF:6,\nb.ts\n#EXTINF:6,\nc.ts\n";
        let Playlist::Media(media) = parse_playlist(text, &base()).unwrap() else {
            panic!("expected media playlist");
        };
        assert_eq!(media.segment_index_at(0.0), Some(0));
        assert_eq!(media.segment_index_at(5.9), Some(0));
        assert_eq!(media.segment_index_at(6.0), Some(1));
        assert_eq!(media.segment_index_at(17.9), Some(2));
        assert_eq!(media.segment_index_at(18.0), None);
        assert_eq!(media.segment_index_at(100.0), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            parse_playlist("<html></html>", &base()),
            Err(ManifestError::MissingHeader)
        );
        assert_eq!(parse_playlist("#EXTM3U\n", &base()), Err(ManifestError::Empty));
        assert!(matches!(
            parse_playlist("#EXTM3U\n#EXTINF:abc,\na.ts\n", &base()),
            Err(ManifestError::InvalidTag { tag: "EXTINF", .. })
        ));
    }
}
