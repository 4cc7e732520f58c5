//! Synthetic record source.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::codecs::{PlainKey, PlainValue};
use crate::error::CacheResult;
use crate::loader::{Record, Source};

/// Window of generation tokens in flight; throttles the workers against the
/// record channel.
const TOKEN_WINDOW: usize = 1000;

fn default_thread_num() -> usize {
    10
}

fn default_total() -> usize {
    20
}

fn default_key_len() -> usize {
    36
}

fn default_val_len() -> usize {
    23
}

/// Configuration for [`FakeSource`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FakeSourceConfig {
    /// Worker pool size.
    pub thread_num: usize,
    /// Number of records to emit.
    pub total: usize,
    /// Generated key length.
    pub key_len: usize,
    /// Generated value length.
    pub val_len: usize,
}

impl Default for FakeSourceConfig {
    fn default() -> Self {
        Self {
            thread_num: default_thread_num(),
            total: default_total(),
            key_len: default_key_len(),
            val_len: default_val_len(),
        }
    }
}

/// Source emitting `total` records with base64-random keys and values.
///
/// Used to seed load tests and the benchmark preload when no real data set
/// is at hand.
pub struct FakeSource {
    thread_num: usize,
    total: usize,
    key_len: usize,
    val_len: usize,
}

impl FakeSource {
    /// Create a synthetic source.
    #[must_use]
    pub fn new(config: FakeSourceConfig) -> Self {
        Self {
            thread_num: config.thread_num,
            total: config.total,
            key_len: config.key_len,
            val_len: config.val_len,
        }
    }

    fn fake(&self) -> Record<PlainKey, PlainValue> {
        Record::new(
            PlainKey::new(rand_text(self.key_len)),
            PlainValue::new(rand_text(self.val_len)),
        )
    }
}

/// Base64 of random bytes, truncated to `len` characters.
fn rand_text(len: usize) -> String {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    let mut text = STANDARD.encode(&buf);
    text.truncate(len);
    text
}

#[async_trait]
impl Source<PlainKey, PlainValue> for FakeSource {
    async fn produce(
        self: Arc<Self>,
        workers: &mut JoinSet<()>,
        tx: mpsc::Sender<Record<PlainKey, PlainValue>>,
    ) -> CacheResult<()> {
        let (token_tx, token_rx) = mpsc::channel::<()>(TOKEN_WINDOW);
        let total = self.total;
        tokio::spawn(async move {
            for _ in 0..total {
                if token_tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        let token_rx = Arc::new(Mutex::new(token_rx));
        for _ in 0..self.thread_num {
            let source = Arc::clone(&self);
            let token_rx = Arc::clone(&token_rx);
            let tx = tx.clone();
            workers.spawn(async move {
                loop {
                    let token = { token_rx.lock().await.recv().await };
                    if token.is_none() {
                        break;
                    }
                    if tx.send(source.fake()).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(())
    }
}
