//! Local-directory record source.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::error::{CacheError, CacheResult};
use crate::loader::{Coder, Record, Source};

fn default_directory() -> PathBuf {
    PathBuf::from("data")
}

fn default_thread_num() -> usize {
    10
}

/// Configuration for [`FileSource`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileSourceConfig {
    /// Directory whose regular files are read. Not recursed into.
    pub directory: PathBuf,
    /// Worker pool size.
    pub thread_num: usize,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            thread_num: default_thread_num(),
        }
    }
}

/// Source reading `coder`-encoded lines from every regular file in a
/// directory.
///
/// Files are distributed over the worker pool; a file that cannot be opened
/// is logged and skipped, as is every undecodable line.
pub struct FileSource<K, V> {
    directory: PathBuf,
    thread_num: usize,
    coder: Arc<dyn Coder<K, V>>,
}

impl<K, V> FileSource<K, V> {
    /// Create a file source.
    pub fn new(config: FileSourceConfig, coder: Arc<dyn Coder<K, V>>) -> Self {
        Self {
            directory: config.directory,
            thread_num: config.thread_num,
            coder,
        }
    }

    /// List the regular files in the source directory (non-recursive).
    async fn list(&self) -> CacheResult<Vec<PathBuf>> {
        let mut parts = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(CacheError::backend)?;
        while let Some(entry) = entries.next_entry().await.map_err(CacheError::backend)? {
            let file_type = entry.file_type().await.map_err(CacheError::backend)?;
            if file_type.is_file() {
                parts.push(entry.path());
            }
        }

        Ok(parts)
    }
}

#[async_trait]
impl<K, V> Source<K, V> for FileSource<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    async fn produce(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        tx: mpsc::Sender<Record<K, V>>,
    ) -> CacheResult<()> {
        let files = self.list().await?;

        let (file_tx, file_rx) = mpsc::channel(files.len().max(1));
        tokio::spawn(async move {
            for file in files {
                if file_tx.send(file).await.is_err() {
                    break;
                }
            }
        });

        let file_rx = Arc::new(Mutex::new(file_rx));
        for _ in 0..self.thread_num {
            let source = Arc::clone(&self);
            let file_rx = Arc::clone(&file_rx);
            let tx = tx.clone();
            workers.spawn(async move {
                loop {
                    let file = { file_rx.lock().await.recv().await };
                    let Some(path) = file else {
                        break;
                    };
                    source.read_file(&path, &tx).await;
                }
            });
        }

        Ok(())
    }
}

impl<K, V> FileSource<K, V> {
    async fn read_file(&self, path: &PathBuf, tx: &mpsc::Sender<Record<K, V>>) {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot open source file");
                return;
            }
        };

        let mut lines = BufReader::new(file).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match self.coder.decode(&line) {
                    Ok(record) => {
                        if tx.send(record).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping undecodable line");
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "read failed, skipping rest of file");
                    break;
                }
            }
        }
    }
}
