use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;

use crate::error::ProbeError;

/// Measures how long a media file plays, in seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_secs(&self, media: &Path) -> Result<f64, ProbeError>;
}

/// Reads `format=duration` with ffprobe. Works for `.mp4` files and HLS playlists.
pub struct Ffprobe {
    binary: String,
}

impl Ffprobe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl DurationProbe for Ffprobe {
    async fn duration_secs(&self, media: &Path) -> Result<f64, ProbeError> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(media)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("{} stdout: {}", self.binary, stdout.trim());

        if !output.status.success() {
            return Err(ProbeError::Failed {
                binary: self.binary.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_duration(&stdout)
    }
}

/// Parses ffprobe's bare duration line. "N/A", negative and non-finite values are rejected.
pub fn parse_duration(raw: &str) -> Result<f64, ProbeError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(ProbeError::InvalidOutput(trimmed.to_string())),
    }
}
