//! Publishing a capture through an lbrynet daemon's JSON-RPC `publish` method.

use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use percent_encoding::percent_decode_str;
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::{Position, Url};

use crate::capture::Capture;
use crate::config::LbryConfig;
use crate::error::PublishError;

const TAGS: [&str; 4] = ["destiny", "streamer", "vod", "politics"];

/// The `params` object of an lbrynet `publish` call.
#[derive(Debug, Clone, Serialize)]
pub struct PublishParams {
    pub name: String,
    pub title: String,
    pub bid: String,
    pub file_path: String,
    pub validate_file: bool,
    pub optimize_file: bool,
    pub author: String,
    pub description: String,
    pub tags: Vec<String>,
    pub languages: Vec<String>,
    pub locations: Vec<String>,
    pub channel_name: String,
    pub wallet_id: String,
    pub funding_account_ids: Vec<String>,
    pub preview: bool,
    pub blocking: bool,
}

impl PublishParams {
    /// Builds the request for `capture`. `suffix` keeps claim names of re-uploads apart.
    pub fn new(capture: &Capture, config: &LbryConfig, suffix: u32) -> Self {
        let window = &capture.window;
        let mut tags: Vec<String> = TAGS[..3].iter().map(|t| t.to_string()).collect();
        tags.push(window.start_tag());
        tags.push(TAGS[3].to_string());

        Self {
            name: format!("{}-r-{}", capture.video_id, suffix),
            title: format!("[{}] - {}", capture.video_id, capture.metadata.title),
            bid: config.bid.clone(),
            file_path: daemon_file_path(&capture.media, &config.file_root)
                .to_string_lossy()
                .into_owned(),
            validate_file: false,
            optimize_file: false,
            author: config.author.clone(),
            description: format!("{}\n{}", window.start_iso(), window.end_iso()),
            tags,
            languages: vec!["en".to_string()],
            locations: Vec::new(),
            channel_name: config.lbrychannel.clone(),
            wallet_id: config.wallet_id.clone(),
            funding_account_ids: Vec::new(),
            preview: false,
            blocking: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: &'a PublishParams,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<PublishResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct PublishResult {
    #[serde(default)]
    outputs: Vec<PublishedClaim>,
}

/// The claim lbrynet created for a publish.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedClaim {
    pub permanent_url: String,
    pub claim_id: String,
}

impl PublishedClaim {
    /// `lbry://name#claimid` becomes `name/<claim_id>`.
    pub fn reference(&self) -> Result<String, PublishError> {
        let invalid = |reason: &str| PublishError::InvalidPermanentUrl {
            url: self.permanent_url.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(&self.permanent_url).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "lbry" {
            return Err(invalid("scheme is not lbry"));
        }
        let claim_path = percent_decode_str(&url[Position::BeforeUsername..Position::AfterQuery])
            .decode_utf8()
            .map_err(|e| invalid(&e.to_string()))?;
        if claim_path.is_empty() {
            return Err(invalid("no claim name"));
        }
        Ok(format!("{}/{}", claim_path, self.claim_id))
    }
}

/// Talks to one lbrynet daemon.
pub struct LbryClient {
    http: reqwest::Client,
    endpoint: String,
}

impl LbryClient {
    pub fn new(endpoint: &str) -> Self {
        LbryClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Publishes the capture's mp4 to the configured channel.
    pub async fn publish_capture(
        &self,
        capture: &Capture,
        config: &LbryConfig,
    ) -> Result<PublishedClaim, PublishError> {
        let suffix = rand::thread_rng().gen_range(1..=100);
        let params = PublishParams::new(capture, config, suffix);
        debug!(
            "{} - {}",
            capture.video_id,
            sanitize_title(&capture.metadata.title)
        );
        self.publish(&params).await
    }

    /// Sends one `publish` request. Nothing is retried.
    pub async fn publish(&self, params: &PublishParams) -> Result<PublishedClaim, PublishError> {
        info!("publishing {} to {}", params.name, self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .json(&RpcRequest {
                method: "publish",
                params,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status { status, body });
        }

        let rpc: RpcResponse = response.json().await?;
        if let Some(error) = rpc.error {
            return Err(PublishError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let claim = rpc
            .result
            .and_then(|result| result.outputs.into_iter().next())
            .ok_or(PublishError::NoOutputs)?;
        info!("published {} as claim {}", claim.permanent_url, claim.claim_id);
        Ok(claim)
    }
}

/// Where the daemon finds the media. Captures under a `captured` directory are mounted
/// at `file_root` inside the daemon's environment; other paths are used as they are.
pub fn daemon_file_path(media: &Path, file_root: &Path) -> PathBuf {
    let components: Vec<Component> = media.components().collect();
    match components
        .iter()
        .position(|c| c.as_os_str() == "captured")
    {
        Some(at) => components[at..]
            .iter()
            .fold(file_root.to_path_buf(), |path, c| path.join(c)),
        None => media.to_path_buf(),
    }
}

fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
