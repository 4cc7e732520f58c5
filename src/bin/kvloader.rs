//! `kvloader` - run the bulk-load pipeline once.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use tierkv::config::{self, LoaderConfig};

#[derive(Debug, Parser)]
#[command(
    name = "kvloader",
    version,
    disable_version_flag = true,
    about = "Stream key/value records from a source into a cache tier"
)]
struct Args {
    /// Print the version and exit.
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Configuration file.
    #[arg(short = 'f', long = "filename", default_value = "configs/kvloader.json")]
    filename: PathBuf,

    /// Override the object source's listing suffix, usually a datetime.
    #[arg(long = "s3-suffix")]
    s3_suffix: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config: LoaderConfig = config::load_json(&args.filename)
        .with_context(|| format!("loading [{}]", args.filename.display()))?;
    if let Some(suffix) = args.s3_suffix {
        config.producer.override_suffix(suffix);
    }

    let loader = config::build_loader(&config).await.context("building loader")?;
    loader.load().await.context("running loader")?;

    Ok(())
}
