//! Uploading a capture folder to IPFS through web3.storage.
//!
//! The folder is encoded locally as a UnixFS DAG, packed into CAR files and sent in
//! chunks, so the root CID is known before any bytes leave the machine.

pub mod car;
pub mod cid;
pub mod dag;
pub mod progress;
pub mod web3_storage;

pub use cid::Cid;
pub use progress::{Progress, UploadObserver};
pub use web3_storage::{PreparedUpload, Web3Storage};

/// Appends `n` as an unsigned LEB128 varint.
pub(crate) fn put_uvarint(buf: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        buf.push((n as u8) | 0x80);
        n >>= 7;
    }
    buf.push(n as u8);
}

pub(crate) fn uvarint_len(n: u64) -> usize {
    let bits = 64 - n.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}
