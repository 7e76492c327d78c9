//! Command-line configuration for the two publishers.
//!
//! Each binary parses its struct once at startup and passes it down by reference.

use std::path::PathBuf;

use clap::{Args, Parser};

/// Options shared by both publishers.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// SQLite ledger file
    #[arg(long, env = "CAPTURE_DB")]
    pub db: PathBuf,

    /// Capture directory to publish
    #[arg(long)]
    pub path: PathBuf,

    /// ffprobe binary used to measure the capture length
    #[arg(long, env = "FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,
}

/// lbrynet connection and claim settings.
#[derive(Debug, Clone, Args)]
pub struct LbryConfig {
    /// lbrynet JSON-RPC endpoint, e.g. http://localhost:5279
    #[arg(long = "lbryurl", env = "LBRY_URL")]
    pub lbryurl: String,

    /// Channel the claim is published in
    #[arg(long = "lbrychannel", env = "LBRY_CHANNEL")]
    pub lbrychannel: String,

    /// LBC staked on the claim
    #[arg(long, default_value = "0.0001")]
    pub bid: String,

    #[arg(long, default_value = "default_wallet")]
    pub wallet_id: String,

    #[arg(long, default_value = "Destiny")]
    pub author: String,

    /// Directory the daemon sees the `captured` tree under
    #[arg(long, default_value = "/home")]
    pub file_root: PathBuf,
}

/// Publish a capture's mp4 to LBRY/Odysee and record it in the ledger.
#[derive(Debug, Clone, Parser)]
#[command(name = "lbry-publish", version)]
pub struct LbryArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub lbry: LbryConfig,
}

/// web3.storage credentials and upload tuning.
#[derive(Debug, Clone, Args)]
pub struct Web3StorageConfig {
    /// web3.storage API token
    #[arg(long, env = "W3S_TOKEN", hide_env_values = true)]
    pub token: String,

    #[arg(long, default_value = "https://api.web3.storage")]
    pub endpoint: String,

    /// Upper bound for one CAR request body, in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub chunk_size: usize,
}

/// Upload a capture folder to IPFS through web3.storage and record it in the ledger.
#[derive(Debug, Clone, Parser)]
#[command(name = "ipfs-publish", version)]
pub struct IpfsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub storage: Web3StorageConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn commands_are_well_formed() {
        LbryArgs::command().debug_assert();
        IpfsArgs::command().debug_assert();
    }

    #[test]
    fn parses_lbry_flags() {
        let args = LbryArgs::try_parse_from([
            "lbry-publish",
            "--db",
            "vods.db",
            "--path",
            "/captured/2023_TWITCH_20230615_140000",
            "--lbryurl",
            "http://localhost:5279",
            "--lbrychannel",
            "@vods",
        ])
        .unwrap();

        assert_eq!(args.common.db, PathBuf::from("vods.db"));
        assert_eq!(args.lbry.lbrychannel, "@vods");
        assert_eq!(args.lbry.bid, "0.0001");
        assert_eq!(args.lbry.file_root, PathBuf::from("/home"));
    }

    #[test]
    fn rejects_bad_or_missing_flags() {
        let err = IpfsArgs::try_parse_from([
            "ipfs-publish",
            "--db",
            "vods.db",
            "--path",
            "/captured/x",
            "--token",
            "t",
            "--chunk-size",
            "not-a-number",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = LbryArgs::try_parse_from(["lbry-publish", "--db", "vods.db", "--path", "/x"]);
        assert!(err.is_err());
    }

    #[test]
    fn ipfs_defaults() {
        let args = IpfsArgs::try_parse_from([
            "ipfs-publish",
            "--db",
            "vods.db",
            "--path",
            "/captured/x",
            "--token",
            "secret",
        ])
        .unwrap();
        assert_eq!(args.storage.endpoint, "https://api.web3.storage");
        assert_eq!(args.storage.chunk_size, 10 * 1024 * 1024);
    }
}
