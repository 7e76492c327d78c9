use anyhow::{Context, Result};
use clap::Parser;

use capture_publisher::config::LbryArgs;
use capture_publisher::pipeline;
use capture_publisher::probe::Ffprobe;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = LbryArgs::parse();
    let probe = Ffprobe::new(&args.common.ffprobe);

    pipeline::publish_to_lbry(&args.common, &args.lbry, &probe)
        .await
        .context("LBRY publish failed")?;
    Ok(())
}
