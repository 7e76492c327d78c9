//! Resolves a capture folder into everything the publishers and the ledger need.
//!
//! A capture folder holds one recorded stream segment: a JSON sidecar named after the
//! video id, and the media itself (`<id>.mp4`, or an HLS `index.m3u8` playlist with its
//! segments). The folder name embeds the capture start as `YYYYMMDD_HHmmss`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Duration, NaiveDateTime};
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;

use crate::error::{ProbeError, ResolveError};
use crate::probe::DurationProbe;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const TAG_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FOLDER_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The sidecar written next to every capture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptureMetadata {
    pub title: String,
    pub author_name: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Youtube,
    Twitch,
}

impl Platform {
    /// Captures recorded from YouTube carry `YOUTUBE` somewhere in their path.
    pub fn from_path(path: &Path) -> Self {
        if path.to_string_lossy().contains("YOUTUBE") {
            Platform::Youtube
        } else {
            Platform::Twitch
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Twitch => "twitch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the capture started and ended. `end == start + duration` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureWindow {
    start: NaiveDateTime,
    duration: Duration,
    end: NaiveDateTime,
}

impl CaptureWindow {
    /// Builds a window from a probed duration in seconds, kept to the millisecond.
    /// Durations that would carry the end past the representable calendar are rejected.
    pub fn new(start: NaiveDateTime, duration_secs: f64) -> Result<Self, ResolveError> {
        let invalid = || ProbeError::InvalidOutput(duration_secs.to_string());
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(invalid().into());
        }
        let duration = Duration::try_milliseconds((duration_secs * 1000.0).round() as i64)
            .ok_or_else(invalid)?;
        let end = start.checked_add_signed(duration).ok_or_else(invalid)?;
        Ok(Self {
            start,
            duration,
            end,
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// `2023-06-15T14:00:00Z`
    pub fn start_iso(&self) -> String {
        self.start.format(ISO_FORMAT).to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end().format(ISO_FORMAT).to_string()
    }

    /// `2023-06-15 14:00:00`, used as a publish tag.
    pub fn start_tag(&self) -> String {
        self.start.format(TAG_FORMAT).to_string()
    }
}

/// Which file in the folder is probed for the capture length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// `<id>.mp4`
    Mp4,
    /// `index.m3u8`
    HlsPlaylist,
}

impl MediaKind {
    fn file_name(&self, video_id: &str) -> String {
        match self {
            MediaKind::Mp4 => format!("{video_id}.mp4"),
            MediaKind::HlsPlaylist => "index.m3u8".to_string(),
        }
    }
}

/// A resolved capture folder.
#[derive(Debug, Clone)]
pub struct Capture {
    pub dir: PathBuf,
    pub folder_name: String,
    pub platform: Platform,
    pub video_id: String,
    pub metadata: CaptureMetadata,
    pub window: CaptureWindow,
    pub media: PathBuf,
}

/// Reads the sidecar, parses the folder timestamp and probes the media length.
pub async fn resolve(
    dir: &Path,
    kind: MediaKind,
    probe: &dyn DurationProbe,
) -> Result<Capture, ResolveError> {
    let folder_name = folder_name(dir);
    let platform = Platform::from_path(dir);
    debug!("resolving capture {} ({platform})", dir.display());

    let sidecar = find_sidecar(dir)?;
    let video_id = sidecar
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| ResolveError::MissingMetadata(dir.to_path_buf()))?;
    let metadata = read_metadata(&sidecar).await?;
    debug!("video {video_id}: {metadata:?}");

    let start = parse_start_time(&folder_name)?;

    let media = dir.join(kind.file_name(&video_id));
    if !tokio::fs::try_exists(&media).await.unwrap_or(false) {
        return Err(ResolveError::MissingMedia(media));
    }
    let duration_secs = probe.duration_secs(&media).await?;
    let window = CaptureWindow::new(start, duration_secs)?;

    info!(
        "capture {video_id}: {} -> {} ({duration_secs}s)",
        window.start_iso(),
        window.end_iso()
    );

    Ok(Capture {
        dir: dir.to_path_buf(),
        folder_name,
        platform,
        video_id,
        metadata,
        window,
        media,
    })
}

/// Base name of the capture directory. Trailing separators are ignored.
pub fn folder_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First entry (by name) whose file name contains `json`.
pub fn find_sidecar(dir: &Path) -> Result<PathBuf, ResolveError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ResolveError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().contains("json"))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::MissingMetadata(dir.to_path_buf()))
}

async fn read_metadata(path: &Path) -> Result<CaptureMetadata, ResolveError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| ResolveError::ReadMetadata {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|source| ResolveError::MalformedMetadata {
        path: path.to_path_buf(),
        source,
    })
}

/// Finds the first `YYYYMMDD_HHmmss` in a folder name. The time is naive: no zone
/// conversion happens anywhere.
pub fn parse_start_time(folder_name: &str) -> Result<NaiveDateTime, ResolveError> {
    static STAMP: OnceLock<Regex> = OnceLock::new();
    let stamp = STAMP.get_or_init(|| Regex::new(r"\d{8}_\d{6}").expect("static regex"));

    let found = stamp
        .find(folder_name)
        .ok_or_else(|| ResolveError::TimestampParse(folder_name.to_string()))?;
    NaiveDateTime::parse_from_str(found.as_str(), FOLDER_FORMAT)
        .map_err(|_| ResolveError::TimestampParse(folder_name.to_string()))
}
