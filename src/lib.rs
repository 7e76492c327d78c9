//! Publishes recorded stream captures to LBRY/Odysee or IPFS and keeps a local SQLite
//! ledger of what went where.

pub mod capture;
pub mod config;
pub mod error;
pub mod ipfs;
pub mod lbry;
pub mod ledger;
pub mod pipeline;
pub mod probe;
pub mod thumbnail;
