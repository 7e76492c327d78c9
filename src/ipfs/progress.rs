use log::info;

use super::cid::Cid;

/// Hooks called while an upload runs.
pub trait UploadObserver: Send {
    /// Called once, before any chunk is sent.
    fn on_root_cid(&mut self, cid: &Cid);

    /// Called after web3.storage acknowledged a chunk of `size` bytes.
    fn on_stored_chunk(&mut self, size: u64);
}

/// Logs cumulative upload progress against the known payload size.
#[derive(Debug, Clone)]
pub struct Progress {
    total: u64,
    uploaded: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Progress { total, uploaded: 0 }
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded
    }

    /// Percent complete. An empty payload is complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.uploaded as f64 / self.total as f64 * 100.0).min(100.0)
    }

    /// `percent` with two decimals, e.g. `42.17`.
    pub fn label(&self) -> String {
        format!("{:.2}", self.percent())
    }
}

impl UploadObserver for Progress {
    fn on_root_cid(&mut self, cid: &Cid) {
        info!("root CID: {cid}");
    }

    fn on_stored_chunk(&mut self, size: u64) {
        self.uploaded = self.uploaded.saturating_add(size);
        info!("Uploading: {}%", self.label());
    }
}
