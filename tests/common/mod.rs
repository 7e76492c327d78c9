#![allow(dead_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::Connection;
use tempfile::TempDir;

use capture_publisher::config::CommonArgs;
use capture_publisher::error::ProbeError;
use capture_publisher::probe::DurationProbe;

pub const FOLDER: &str = "2023_TWITCH_20230615_140000";
pub const SIDECAR: &str =
    r#"{"title":"Test","author_name":"Destiny","thumbnail_url":"http://x/hqdefault.jpg"}"#;

/// Stands in for ffprobe.
pub struct FixedDuration(pub f64);

#[async_trait]
impl DurationProbe for FixedDuration {
    async fn duration_secs(&self, _media: &Path) -> Result<f64, ProbeError> {
        Ok(self.0)
    }
}

pub struct Workspace {
    _root: TempDir,
    pub capture: PathBuf,
    pub db: PathBuf,
}

impl Workspace {
    pub fn new(files: &[(&str, &[u8])]) -> Self {
        let root = TempDir::new().unwrap();
        let capture = root.path().join("captured").join(FOLDER);
        std::fs::create_dir_all(&capture).unwrap();
        for (name, contents) in files {
            let path = capture.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, contents).unwrap();
        }
        let db = root.path().join("vods.db");
        Workspace {
            _root: root,
            capture,
            db,
        }
    }

    /// Points the ledger at a directory that does not exist, so opening it fails.
    pub fn with_unwritable_ledger(mut self) -> Self {
        self.db = self._root.path().join("missing").join("vods.db");
        self
    }

    pub fn common(&self) -> CommonArgs {
        CommonArgs {
            db: self.db.clone(),
            path: self.capture.clone(),
            ffprobe: "ffprobe".to_string(),
        }
    }

    /// Rows in `table`, zero when the ledger or table was never created.
    pub fn row_count(&self, table: &str) -> i64 {
        if !self.db.exists() {
            return 0;
        }
        let conn = Connection::open(&self.db).unwrap();
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |r| r.get(0),
            )
            .unwrap();
        if exists == 0 {
            return 0;
        }
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.db).unwrap()
    }
}
