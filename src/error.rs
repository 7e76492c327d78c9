use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning a capture folder into a [`crate::capture::Capture`].
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read capture directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no metadata sidecar found in {0}")]
    MissingMetadata(PathBuf),

    #[error("failed to read metadata file {path}")]
    ReadMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata in {path}: {source}")]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no YYYYMMDD_HHmmss timestamp in folder name {0:?}")]
    TimestampParse(String),

    #[error("media file {0} not found")]
    MissingMedia(PathBuf),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Failures from the media duration probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {binary}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with {status}: {stderr}")]
    Failed {
        binary: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("unusable duration {0:?}")]
    InvalidOutput(String),
}

/// Failures from the lbrynet `publish` call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request to lbrynet failed")]
    Http(#[from] reqwest::Error),

    #[error("lbrynet answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("lbrynet error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("publish response has no outputs")]
    NoOutputs,

    #[error("invalid permanent url {url:?}: {reason}")]
    InvalidPermanentUrl { url: String, reason: String },
}

/// Failures while packing or sending a folder to web3.storage.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("entry name is not valid UTF-8: {0}")]
    InvalidName(PathBuf),

    #[error("{0} changed while it was being uploaded")]
    FileChanged(PathBuf),

    #[error("request to web3.storage failed")]
    Http(#[from] reqwest::Error),

    #[error("web3.storage answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("web3.storage stored {actual}, expected {expected}")]
    CidMismatch { expected: String, actual: String },

    #[error("packing task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures while writing the ledger row.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("ledger task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Any failure of a publish run, by stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not resolve capture")]
    Resolve(#[from] ResolveError),

    #[error("publish failed")]
    Publish(#[from] PublishError),

    #[error("upload failed")]
    Upload(#[from] UploadError),

    #[error("ledger write failed")]
    Ledger(#[from] LedgerError),
}
