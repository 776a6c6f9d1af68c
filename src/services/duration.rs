//! Best-effort episode duration discovery.
//!
//! Progressive MP4 files are probed with small `Range` requests: top-level
//! boxes are walked header by header until `moov` is found, then its `mvhd`
//! child yields `duration / timescale`. HLS streams are probed by summing the
//! `#EXTINF` tags of the media playlist, following the first variant of a
//! master playlist.

use crate::db::Store;
use crate::domain::EpisodeId;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Upper bound on boxes inspected before giving up on a file.
const MAX_BOXES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub episode: EpisodeId,
    pub url: String,
    pub is_m3u8: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Probe request timed out")]
    Timeout,

    #[error("Probe request failed: {0}")]
    Http(String),

    #[error("Server does not support range requests")]
    RangeUnsupported,

    #[error("Malformed media: {0}")]
    Malformed(String),

    #[error("No moov box found")]
    MissingMoov,

    #[error("Playlist has no segments")]
    EmptyPlaylist,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub kind: [u8; 4],
    /// Total box size including the header; `None` extends to end of file.
    pub size: Option<u64>,
    pub header_len: u64,
}

/// Parses an ISO-BMFF box header. `bytes` must hold 16 bytes when the
/// compact size field is 1 (64-bit `largesize` follows the type).
pub fn parse_box_header(bytes: &[u8]) -> Result<BoxHeader, ProbeError> {
    if bytes.len() < 8 {
        return Err(ProbeError::Malformed("truncated box header".to_string()));
    }

    let size32 = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let kind = [bytes[4], bytes[5], bytes[6], bytes[7]];

    match size32 {
        0 => Ok(BoxHeader {
            kind,
            size: None,
            header_len: 8,
        }),
        1 => {
            let large: [u8; 8] = bytes
                .get(8..16)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| ProbeError::Malformed("truncated largesize".to_string()))?;
            let size = u64::from_be_bytes(large);
            if size < 16 {
                return Err(ProbeError::Malformed(format!("box size {size} too small")));
            }
            Ok(BoxHeader {
                kind,
                size: Some(size),
                header_len: 16,
            })
        }
        n if n < 8 => Err(ProbeError::Malformed(format!("box size {n} too small"))),
        n => Ok(BoxHeader {
            kind,
            size: Some(u64::from(n)),
            header_len: 8,
        }),
    }
}

/// Duration in seconds from an `mvhd` body (starting at the version byte).
pub fn parse_mvhd(body: &[u8]) -> Result<f64, ProbeError> {
    let version = *body
        .first()
        .ok_or_else(|| ProbeError::Malformed("empty mvhd".to_string()))?;

    let (timescale, duration) = match version {
        0 => {
            let timescale = read_u32(body, 12)?;
            let duration = u64::from(read_u32(body, 16)?);
            (timescale, duration)
        }
        1 => {
            let timescale = read_u32(body, 20)?;
            let duration = read_u64(body, 24)?;
            (timescale, duration)
        }
        v => return Err(ProbeError::Malformed(format!("unknown mvhd version {v}"))),
    };

    if timescale == 0 {
        return Err(ProbeError::Malformed("mvhd timescale is zero".to_string()));
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(duration as f64 / f64::from(timescale))
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, ProbeError> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| ProbeError::Malformed("truncated mvhd".to_string()))
}

fn read_u64(bytes: &[u8], at: usize) -> Result<u64, ProbeError> {
    bytes
        .get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| ProbeError::Malformed("truncated mvhd".to_string()))
}

/// Offset of whatever follows `len` bytes at `offset`. Box sizes come from
/// the remote file, so the sum may not fit.
fn offset_after(offset: u64, len: u64) -> Result<u64, ProbeError> {
    offset
        .checked_add(len)
        .ok_or_else(|| ProbeError::Malformed(format!("box of {len} bytes at {offset} overflows")))
}

/// URI of the first variant stream of a master playlist.
#[must_use]
pub fn first_variant(playlist: &str) -> Option<&str> {
    let mut lines = playlist.lines().map(str::trim);
    while let Some(line) = lines.next() {
        if line.starts_with("#EXT-X-STREAM-INF") {
            return lines.find(|l| !l.is_empty() && !l.starts_with('#'));
        }
    }
    None
}

/// Sum of `#EXTINF` durations and the number of segments counted.
#[must_use]
pub fn sum_extinf(playlist: &str) -> (f64, usize) {
    playlist
        .lines()
        .filter_map(|line| line.trim().strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next()?.trim().parse::<f64>().ok())
        .fold((0.0, 0), |(total, count), d| (total + d, count + 1))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSummary {
    pub probed: usize,
    pub failed: usize,
}

pub struct DurationProber {
    client: Client,
}

impl DurationProber {
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent("Anicat/1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build probe HTTP client: {e}"))?;
        Ok(Self { client })
    }

    /// Duration in seconds of the media at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] on network failure, timeout or an
    /// unrecognised container.
    pub async fn probe(&self, url: &str, is_m3u8: bool) -> Result<f64, ProbeError> {
        if is_m3u8 {
            self.probe_hls(url).await
        } else {
            self.probe_mp4(url).await
        }
    }

    async fn probe_mp4(&self, url: &str) -> Result<f64, ProbeError> {
        let mut offset = 0;
        for _ in 0..MAX_BOXES {
            let header = self.read_box_header(url, offset).await?;
            if &header.kind == b"moov" {
                let end = header
                    .size
                    .map(|size| offset_after(offset, size))
                    .transpose()?;
                let body = offset_after(offset, header.header_len)?;
                return self.read_mvhd(url, body, end).await;
            }
            let Some(size) = header.size else {
                break;
            };
            offset = offset_after(offset, size)?;
        }
        Err(ProbeError::MissingMoov)
    }

    async fn read_mvhd(&self, url: &str, start: u64, end: Option<u64>) -> Result<f64, ProbeError> {
        let mut offset = start;
        for _ in 0..MAX_BOXES {
            if end.is_some_and(|end| offset >= end) {
                break;
            }
            let header = self.read_box_header(url, offset).await?;
            if &header.kind == b"mvhd" {
                let body = self
                    .fetch_range(url, offset_after(offset, header.header_len)?, 32)
                    .await?;
                return parse_mvhd(&body);
            }
            let Some(size) = header.size else {
                break;
            };
            offset = offset_after(offset, size)?;
        }
        Err(ProbeError::Malformed("moov without mvhd".to_string()))
    }

    async fn read_box_header(&self, url: &str, offset: u64) -> Result<BoxHeader, ProbeError> {
        let head = self.fetch_range(url, offset, 8).await?;
        if head.len() >= 4 && head[..4] == [0, 0, 0, 1] {
            let extended = self.fetch_range(url, offset, 16).await?;
            return parse_box_header(&extended);
        }
        parse_box_header(&head)
    }

    async fn fetch_range(&self, url: &str, start: u64, len: u64) -> Result<Vec<u8>, ProbeError> {
        let end = start
            .checked_add(len.saturating_sub(1))
            .ok_or_else(|| ProbeError::Malformed(format!("range at {start} out of bounds")))?;
        let mut response = self
            .client
            .get(url)
            .header(header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            // Full body from the start is usable for the first read only.
            StatusCode::OK if start == 0 => {}
            StatusCode::OK => return Err(ProbeError::RangeUnsupported),
            StatusCode::RANGE_NOT_SATISFIABLE => return Err(ProbeError::MissingMoov),
            status => return Err(ProbeError::Http(format!("unexpected status {status}"))),
        }

        let wanted = usize::try_from(len).unwrap_or(usize::MAX);
        let mut bytes = Vec::with_capacity(wanted);
        while bytes.len() < wanted {
            let Some(chunk) = response.chunk().await? else {
                break;
            };
            bytes.extend_from_slice(&chunk);
        }
        bytes.truncate(wanted);
        Ok(bytes)
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ProbeError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Http(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }

    async fn probe_hls(&self, url: &str) -> Result<f64, ProbeError> {
        let base = Url::parse(url)?;
        let playlist = self.fetch_text(url).await?;

        let media = match first_variant(&playlist) {
            Some(variant) => {
                let variant_url = base.join(variant)?;
                debug!(variant = %variant_url, "Following first HLS variant");
                self.fetch_text(variant_url.as_str()).await?
            }
            None => playlist,
        };

        match sum_extinf(&media) {
            (_, 0) => Err(ProbeError::EmptyPlaylist),
            (total, _) => Ok(total),
        }
    }

    /// Probes each target and stores the rounded duration on success.
    /// Failures leave the episode untouched so a later request retries.
    pub async fn probe_episodes(&self, store: &Store, targets: &[ProbeTarget]) -> ProbeSummary {
        let mut summary = ProbeSummary::default();

        for target in targets {
            let seconds = match self.probe(&target.url, target.is_m3u8).await {
                Ok(seconds) if seconds.is_finite() && seconds >= 0.5 => seconds,
                Ok(seconds) => {
                    warn!(episode_id = %target.episode, seconds, "Ignoring implausible duration");
                    summary.failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(episode_id = %target.episode, url = %target.url, error = %e, "Duration probe failed");
                    summary.failed += 1;
                    continue;
                }
            };

            #[allow(clippy::cast_possible_truncation)]
            let rounded = seconds.round().min(f64::from(i32::MAX)) as i32;
            match store.set_episode_duration(target.episode, rounded).await {
                Ok(()) => {
                    debug!(episode_id = %target.episode, duration = rounded, "Episode duration stored");
                    summary.probed += 1;
                }
                Err(e) => {
                    warn!(episode_id = %target.episode, error = %e, "Failed to store episode duration");
                    summary.failed += 1;
                }
            }
        }

        metrics::counter!("duration_probes_total", "outcome" => "success")
            .increment(summary.probed as u64);
        metrics::counter!("duration_probes_total", "outcome" => "failure")
            .increment(summary.failed as u64);
        summary
    }
}
