//! `kvbench` - run the benchmark schedule against a configured client.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use tierkv::config::{self, BenchConfig};

#[derive(Debug, Parser)]
#[command(
    name = "kvbench",
    version,
    disable_version_flag = true,
    about = "Replay a preloaded working set against a tiered client"
)]
struct Args {
    /// Print the version and exit.
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Configuration file.
    #[arg(short = 'f', long = "filename", default_value = "configs/kvbench.json")]
    filename: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config: BenchConfig = config::load_json(&args.filename)
        .with_context(|| format!("loading [{}]", args.filename.display()))?;
    let benchmarker = config::build_benchmarker(&config)
        .await
        .context("building benchmarker")?;
    benchmarker.run().await.context("running benchmark")?;

    Ok(())
}
