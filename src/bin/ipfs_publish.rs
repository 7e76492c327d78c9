use anyhow::{Context, Result};
use clap::Parser;

use capture_publisher::config::IpfsArgs;
use capture_publisher::pipeline;
use capture_publisher::probe::Ffprobe;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = IpfsArgs::parse();
    let probe = Ffprobe::new(&args.common.ffprobe);

    pipeline::publish_to_ipfs(&args.common, &args.storage, &probe)
        .await
        .context("IPFS upload failed")?;
    Ok(())
}
