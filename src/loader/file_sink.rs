//! Sink writing records to sharded line files.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::error::CacheResult;
use crate::loader::{Coder, SharedReceiver, Sink};

fn default_file_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_num() -> usize {
    10
}

/// Configuration for [`FileSink`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    /// Output path stem; worker `i` writes `<file_path>.<i>`.
    pub file_path: PathBuf,
    /// Number of output files (and workers).
    pub file_num: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            file_path: default_file_path(),
            file_num: default_file_num(),
        }
    }
}

/// Sink encoding each record to one line, sharded across `file_num` files.
///
/// Records that fail to encode are counted and logged, then skipped.
pub struct FileSink<K, V> {
    file_path: PathBuf,
    file_num: usize,
    coder: Arc<dyn Coder<K, V>>,
}

impl<K, V> FileSink<K, V> {
    /// Create a file sink.
    pub fn new(config: FileSinkConfig, coder: Arc<dyn Coder<K, V>>) -> Self {
        Self {
            file_path: config.file_path,
            file_num: config.file_num,
            coder,
        }
    }
}

#[async_trait]
impl<K, V> Sink<K, V> for FileSink<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    async fn consume(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        rx: SharedReceiver<K, V>,
    ) -> CacheResult<()> {
        for i in 0..self.file_num {
            let sink = Arc::clone(&self);
            let rx = Arc::clone(&rx);
            workers.spawn(async move {
                let path = PathBuf::from(format!("{}.{i}", sink.file_path.display()));
                let file = match File::create(&path).await {
                    Ok(file) => file,
                    Err(err) => {
                        error!(path = %path.display(), error = %err, "cannot create sink file");
                        return;
                    }
                };

                let mut writer = BufWriter::new(file);
                loop {
                    let record = { rx.lock().await.recv().await };
                    let Some(record) = record else {
                        break;
                    };
                    let line = match sink.coder.encode(&record) {
                        Ok(line) => line,
                        Err(err) => {
                            warn!(error = %err, "skipping unencodable record");
                            continue;
                        }
                    };
                    if let Err(err) = writer.write_all(line.as_bytes()).await {
                        error!(path = %path.display(), error = %err, "write failed");
                        break;
                    }
                    if let Err(err) = writer.write_all(b"\n").await {
                        error!(path = %path.display(), error = %err, "write failed");
                        break;
                    }
                }
                if let Err(err) = writer.flush().await {
                    error!(path = %path.display(), error = %err, "flush failed");
                }
            });
        }

        Ok(())
    }
}
