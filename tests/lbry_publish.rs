mod common;

use std::path::PathBuf;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use capture_publisher::config::LbryConfig;
use capture_publisher::error::{LedgerError, PipelineError, PublishError};
use capture_publisher::ledger::UploadReference;
use capture_publisher::pipeline;

use common::{FixedDuration, Workspace, FOLDER, SIDECAR};

fn lbry_config(server: &MockServer) -> LbryConfig {
    LbryConfig {
        lbryurl: server.uri(),
        lbrychannel: "@vods".to_string(),
        bid: "0.0001".to_string(),
        wallet_id: "default_wallet".to_string(),
        author: "Destiny".to_string(),
        file_root: PathBuf::from("/home"),
    }
}

fn capture_workspace() -> Workspace {
    Workspace::new(&[("abc123.json", SIDECAR.as_bytes()), ("abc123.mp4", &[])])
}

async fn daemon_replying(result: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn publishes_and_records_odysee_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "publish",
            "params": {
                "title": "[abc123] - Test",
                "channel_name": "@vods",
                "file_path": format!("/home/captured/{FOLDER}/abc123.mp4"),
                "description": "2023-06-15T14:00:00Z\n2023-06-15T15:00:00Z",
                "tags": ["destiny", "streamer", "vod", "2023-06-15 14:00:00", "politics"],
                "blocking": false
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": {
                "outputs": [{
                    "permanent_url": "lbry://abc123-r-17#5b0e1c7e9a",
                    "claim_id": "5b0e1c7e9a0f2d"
                }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ws = capture_workspace();
    let published = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap();

    assert_eq!(
        published.row.reference,
        UploadReference::Odysee {
            url: "abc123-r-17/5b0e1c7e9a0f2d".to_string()
        }
    );
    assert_eq!(ws.row_count("odysee"), 1);

    let (platform, id, username, title, start, end, thumbnail, url): (
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        String,
    ) = ws
        .connection()
        .query_row(
            "SELECT platform, id, username, title, starttime, endtime, thumbnail, url FROM odysee",
            [],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                    r.get(7)?,
                ))
            },
        )
        .unwrap();
    assert_eq!(platform, "twitch");
    assert_eq!(id, "abc123");
    assert_eq!(username, "Destiny");
    assert_eq!(title, "Test");
    assert_eq!(start, "2023-06-15T14:00:00Z");
    assert_eq!(end, "2023-06-15T15:00:00Z");
    assert_eq!(thumbnail, "http://x/mqdefault_live.jpg");
    assert_eq!(url, "abc123-r-17/5b0e1c7e9a0f2d");
}

#[tokio::test]
async fn http_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("wallet locked"))
        .mount(&server)
        .await;

    let ws = capture_workspace();
    let err = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Publish(PublishError::Status { .. })
    ));
    assert_eq!(ws.row_count("odysee"), 0);
}

#[tokio::test]
async fn rpc_error_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32500, "message": "Not enough funds to cover this transaction."}
        })))
        .mount(&server)
        .await;

    let ws = capture_workspace();
    let err = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap_err();

    match err {
        PipelineError::Publish(PublishError::Rpc { code, message }) => {
            assert_eq!(code, -32500);
            assert!(message.starts_with("Not enough funds"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ws.row_count("odysee"), 0);
}

#[tokio::test]
async fn unreachable_daemon_writes_nothing() {
    let server = MockServer::start().await;
    let mut config = lbry_config(&server);
    config.lbryurl = "http://127.0.0.1:1".to_string();

    let ws = capture_workspace();
    let err = pipeline::publish_to_lbry(&ws.common(), &config, &FixedDuration(3600.0))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Publish(PublishError::Http(_))));
    assert_eq!(ws.row_count("odysee"), 0);
}

#[tokio::test]
async fn unresolvable_capture_never_calls_lbry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ws = Workspace::new(&[("abc123.mp4", &[])]);
    let err = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Resolve(_)));
    assert_eq!(ws.row_count("odysee"), 0);
}

#[tokio::test]
async fn foreign_permanent_url_writes_nothing() {
    let server = daemon_replying(json!({
        "outputs": [{"permanent_url": "https://odysee.com/abc123#1", "claim_id": "1"}]
    }))
    .await;

    let ws = capture_workspace();
    let err = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Publish(PublishError::InvalidPermanentUrl { .. })
    ));
    assert_eq!(ws.row_count("odysee"), 0);
}

#[tokio::test]
async fn empty_outputs_write_nothing() {
    let server = daemon_replying(json!({ "outputs": [] })).await;

    let ws = capture_workspace();
    let err = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Publish(PublishError::NoOutputs)));
    assert_eq!(ws.row_count("odysee"), 0);
}

#[tokio::test]
async fn ledger_failure_after_publish_is_reported() {
    let server = daemon_replying(json!({
        "outputs": [{"permanent_url": "lbry://abc123-r-17#5b0e", "claim_id": "5b0e1c"}]
    }))
    .await;

    let ws = capture_workspace().with_unwritable_ledger();
    let err = pipeline::publish_to_lbry(&ws.common(), &lbry_config(&server), &FixedDuration(3600.0))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Ledger(LedgerError::Sqlite(_))));
    assert!(!ws.db.exists());
}
