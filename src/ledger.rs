//! The local SQLite ledger: one row per successful upload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::info;
use rusqlite::{params, Connection};

use crate::capture::Capture;
use crate::error::LedgerError;
use crate::thumbnail;

const ODYSEE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS odysee (
    timest integer,
    platform text,
    id text,
    username text,
    title text,
    starttime text,
    endtime text,
    thumbnail text,
    url text
)";

const IPFS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ipfs (
    timest integer,
    platform text,
    id text,
    username text,
    title text,
    starttime text,
    endtime text,
    thumbnail text,
    cid text,
    folder text
)";

/// Where the capture ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReference {
    /// `claim-name/claim-id` on LBRY.
    Odysee { url: String },
    /// Root CID on IPFS, with the folder name under it.
    Ipfs { cid: String, folder: String },
}

/// A ledger row before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub platform: String,
    pub id: String,
    pub username: String,
    pub title: String,
    pub starttime: String,
    pub endtime: String,
    pub thumbnail: String,
    pub reference: UploadReference,
}

impl LedgerRow {
    pub fn new(capture: &Capture, reference: UploadReference) -> Self {
        LedgerRow {
            platform: capture.platform.as_str().to_string(),
            id: capture.video_id.clone(),
            username: capture.metadata.author_name.clone(),
            title: capture.metadata.title.clone(),
            starttime: capture.window.start_iso(),
            endtime: capture.window.end_iso(),
            thumbnail: thumbnail::normalize(&capture.metadata.thumbnail_url),
            reference,
        }
    }
}

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Ledger {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Opens the database, creates the row's table if needed, inserts, and closes.
    ///
    /// The connection is dropped on every path out of the blocking task.
    pub async fn record(&self, row: LedgerRow) -> Result<(), LedgerError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || insert_row(&path, &row)).await??;
        Ok(())
    }
}

fn open(path: &Path) -> Result<Connection, LedgerError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn insert_row(path: &Path, row: &LedgerRow) -> Result<(), LedgerError> {
    let conn = open(path)?;
    let timest = Utc::now().timestamp_millis();

    match &row.reference {
        UploadReference::Odysee { url } => {
            conn.execute_batch(ODYSEE_SCHEMA)?;
            conn.execute(
                "INSERT INTO odysee (platform, timest, id, username, title, starttime, endtime, thumbnail, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.platform,
                    timest,
                    row.id,
                    row.username,
                    row.title,
                    row.starttime,
                    row.endtime,
                    row.thumbnail,
                    url,
                ],
            )?;
        }
        UploadReference::Ipfs { cid, folder } => {
            conn.execute_batch(IPFS_SCHEMA)?;
            conn.execute(
                "INSERT INTO ipfs (platform, timest, id, username, title, starttime, endtime, thumbnail, cid, folder)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.platform,
                    timest,
                    row.id,
                    row.username,
                    row.title,
                    row.starttime,
                    row.endtime,
                    row.thumbnail,
                    cid,
                    folder,
                ],
            )?;
        }
    }

    info!("recorded {} in {}", row.id, path.display());
    Ok(())
}
