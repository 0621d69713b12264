//! Volume bootstrap binary.
//!
//! Runs inside the server image before the queue manager starts, making
//! sure the mounted data volume is usable by the `mqm` user.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

/// Ensure the mounted data volume has a correctly owned data directory.
#[derive(Parser, Debug)]
#[command(name = "quayside-volume", version, about, long_about = None)]
struct Cli {
    /// Base path of the mounted data volume.
    #[arg(default_value = quayside_common::constants::VOLUME_MOUNT)]
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    quayside_volume::ensure_volume(&cli.path)
        .with_context(|| format!("bootstrapping volume at {}", cli.path.display()))
}
