//! The two publish runs: resolve the capture, upload it, record it. Strictly in that
//! order, and the ledger is only touched after the upload succeeded.

use log::{error, info};

use crate::capture::{self, Capture, MediaKind};
use crate::config::{CommonArgs, LbryConfig, Web3StorageConfig};
use crate::error::PipelineError;
use crate::ipfs::{Cid, PreparedUpload, Progress, Web3Storage};
use crate::lbry::LbryClient;
use crate::ledger::{Ledger, LedgerRow, UploadReference};
use crate::probe::DurationProbe;

/// What a finished run wrote to the ledger.
#[derive(Debug, Clone)]
pub struct Published {
    pub capture: Capture,
    pub row: LedgerRow,
}

/// Publishes `<id>.mp4` through lbrynet and records the claim in the `odysee` table.
pub async fn publish_to_lbry(
    common: &CommonArgs,
    lbry: &LbryConfig,
    probe: &dyn DurationProbe,
) -> Result<Published, PipelineError> {
    let capture = capture::resolve(&common.path, MediaKind::Mp4, probe).await?;

    let client = LbryClient::new(&lbry.lbryurl);
    let claim = client.publish_capture(&capture, lbry).await?;
    let url = claim.reference()?;

    let row = LedgerRow::new(&capture, UploadReference::Odysee { url });
    record(&common.db, &row).await?;
    Ok(Published { capture, row })
}

/// Uploads the whole capture folder to web3.storage and records the CID in the `ipfs`
/// table.
pub async fn publish_to_ipfs(
    common: &CommonArgs,
    storage: &Web3StorageConfig,
    probe: &dyn DurationProbe,
) -> Result<Published, PipelineError> {
    let capture = capture::resolve(&common.path, MediaKind::HlsPlaylist, probe).await?;

    let prepared = PreparedUpload::from_dir(&capture.dir, storage.chunk_size).await?;
    let mut progress = Progress::new(prepared.total_bytes());
    let name = upload_name(&capture);
    let cid: Cid = Web3Storage::new(storage)
        .upload(&prepared, &name, &mut progress)
        .await?;

    let row = LedgerRow::new(
        &capture,
        UploadReference::Ipfs {
            cid: cid.to_string(),
            folder: capture.folder_name.clone(),
        },
    );
    record(&common.db, &row).await?;
    Ok(Published { capture, row })
}

/// `<videoID>_<folderName>`
pub fn upload_name(capture: &Capture) -> String {
    format!("{}_{}", capture.video_id, capture.folder_name)
}

async fn record(db: &std::path::Path, row: &LedgerRow) -> Result<(), PipelineError> {
    if let Err(e) = Ledger::new(db).record(row.clone()).await {
        // The upload already happened; leave enough in the log to add the row by hand.
        error!("uploaded {} but could not record it: {:?}", row.id, row.reference);
        return Err(e.into());
    }
    info!("{} published as {:?}", row.id, row.reference);
    Ok(())
}
