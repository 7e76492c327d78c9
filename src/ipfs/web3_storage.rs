use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::car;
use super::cid::Cid;
use super::dag::{self, Dag};
use super::progress::UploadObserver;
use crate::config::Web3StorageConfig;
use crate::error::UploadError;

const CAR_MIME: &str = "application/vnd.ipld.car";

// Characters encodeURIComponent leaves alone.
const NAME_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Deserialize)]
struct CarResponse {
    cid: String,
}

/// A folder encoded and split into CAR chunks, ready to send.
pub struct PreparedUpload {
    dag: Arc<Dag>,
    header: Arc<Vec<u8>>,
    chunks: Vec<Range<usize>>,
}

impl PreparedUpload {
    /// Encodes `dir` as a UnixFS tree wrapped under its own folder name.
    pub async fn from_dir(dir: &Path, chunk_size: usize) -> Result<Self, UploadError> {
        let dir = dir.to_path_buf();
        let wrap_name = crate::capture::folder_name(&dir);
        let dag = tokio::task::spawn_blocking(move || dag::build(&dir, &wrap_name)).await??;

        let header = car::header(&dag.root);
        let chunks = car::plan(&dag.blocks, header.len(), chunk_size);
        debug!(
            "{} blocks in {} chunks for {} file bytes",
            dag.blocks.len(),
            chunks.len(),
            dag.file_bytes
        );
        Ok(PreparedUpload {
            dag: Arc::new(dag),
            header: Arc::new(header),
            chunks,
        })
    }

    pub fn root(&self) -> Cid {
        self.dag.root
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes that will be sent, summed over all chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .map(|range| car::chunk_len(&self.dag.blocks[range.clone()], self.header.len()) as u64)
            .sum()
    }

    async fn encode_chunk(&self, range: Range<usize>) -> Result<Bytes, UploadError> {
        let dag = Arc::clone(&self.dag);
        let header = Arc::clone(&self.header);
        let bytes =
            tokio::task::spawn_blocking(move || car::write_chunk(&header, &dag.blocks[range]))
                .await??;
        Ok(Bytes::from(bytes))
    }
}

/// Client for the web3.storage `/car` upload endpoint.
pub struct Web3Storage {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl Web3Storage {
    pub fn new(config: &Web3StorageConfig) -> Self {
        Web3Storage {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    /// Sends every chunk in order and returns the root CID. The first failure ends the
    /// upload; nothing is retried.
    pub async fn upload(
        &self,
        prepared: &PreparedUpload,
        name: &str,
        observer: &mut dyn UploadObserver,
    ) -> Result<Cid, UploadError> {
        let root = prepared.root();
        observer.on_root_cid(&root);

        let expected = root.to_string();
        for (i, range) in prepared.chunks.iter().enumerate() {
            let body = prepared.encode_chunk(range.clone()).await?;
            let size = body.len() as u64;
            debug!("sending chunk {}/{} ({size} bytes)", i + 1, prepared.chunk_count());

            let stored = self.put_car(body, name).await?;
            if stored != expected {
                return Err(UploadError::CidMismatch {
                    expected,
                    actual: stored,
                });
            }
            observer.on_stored_chunk(size);
        }

        info!("Successfully uploaded {name} as {expected}");
        Ok(root)
    }

    async fn put_car(&self, body: Bytes, name: &str) -> Result<String, UploadError> {
        let response = self
            .http
            .post(format!("{}/car", self.endpoint))
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, CAR_MIME)
            .header("X-Name", utf8_percent_encode(name, NAME_ENCODE).to_string())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status { status, body });
        }
        let stored: CarResponse = response.json().await?;
        Ok(stored.cid)
    }
}
