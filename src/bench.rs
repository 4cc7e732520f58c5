//! Benchmark driver.
//!
//! Preloads a working set through the loader into memory, then replays it
//! against a [`KvClient`] under a schedule of mixed reader/writer windows,
//! reporting per-operation KPIs: throughput, mean latency, and a cumulative
//! latency distribution over a configurable threshold list.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::info;

use crate::client::KvClient;
use crate::error::CacheResult;
use crate::loader::{Loader, MemSink, Record, Source};

/// Default latency thresholds for the cumulative distribution.
#[must_use]
pub fn default_thresholds() -> Vec<Duration> {
    vec![
        Duration::from_micros(300),
        Duration::from_micros(500),
        Duration::from_micros(800),
        Duration::from_micros(1000),
        Duration::from_micros(2000),
        Duration::from_micros(5000),
    ]
}

fn default_times() -> usize {
    1
}

/// One window of the benchmark schedule.
///
/// `times` repetitions of: slice the working set to
/// `[start_percent% .. end_percent%)`, shard it evenly across
/// `readers + writers` workers, and replay it (readers call `get`, writers
/// call `set`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScheduleItem {
    /// Concurrent readers.
    pub readers: usize,
    /// Concurrent writers.
    pub writers: usize,
    /// Window start, percent of the working set.
    #[serde(default)]
    pub start_percent: usize,
    /// Window end, percent of the working set.
    pub end_percent: usize,
    /// Repetitions; values below 1 run once.
    #[serde(default = "default_times")]
    pub times: usize,
}

/// Aggregated measurements for one operation kind.
#[derive(Debug, Clone)]
pub struct Kpi {
    /// Operation label, `"Get"` or `"Set"`.
    pub op: &'static str,
    /// Operations that completed without error.
    pub success: u64,
    /// Operations that failed.
    pub fail: u64,
    /// Elapsed time summed over successful operations.
    pub total_time: Duration,
    /// Worker KPIs merged into this one.
    pub count: u64,
    /// `distribution[j]` counts successes faster than threshold `j`.
    pub distribution: Vec<u64>,
}

impl Kpi {
    /// Empty KPI for one operation kind.
    #[must_use]
    pub fn new(op: &'static str, thresholds: usize) -> Self {
        Self {
            op,
            success: 0,
            fail: 0,
            total_time: Duration::ZERO,
            count: 1,
            distribution: vec![0; thresholds],
        }
    }

    /// Record one successful operation.
    pub fn observe(&mut self, elapsed: Duration, thresholds: &[Duration]) {
        self.success += 1;
        self.total_time += elapsed;
        for (slot, threshold) in self.distribution.iter_mut().zip(thresholds) {
            if elapsed < *threshold {
                *slot += 1;
            }
        }
    }

    /// Fold another worker's KPI into this one.
    pub fn merge(&mut self, other: &Kpi) {
        self.success += other.success;
        self.fail += other.fail;
        self.total_time += other.total_time;
        self.count += other.count;
        for (slot, value) in self.distribution.iter_mut().zip(&other.distribution) {
            *slot += value;
        }
    }

    /// Render one tab-separated report row under `label`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&self, label: &str) -> String {
        let attempts = (self.success + self.fail) as f64;
        let total_secs = self.total_time.as_secs_f64();
        let qps = if total_secs > 0.0 {
            self.success as f64 * self.count as f64 / total_secs
        } else {
            0.0
        };
        let avg = if self.success > 0 {
            self.total_time / u32::try_from(self.success).unwrap_or(u32::MAX)
        } else {
            Duration::ZERO
        };
        let ratios: Vec<String> = self
            .distribution
            .iter()
            .map(|count| {
                if attempts > 0.0 {
                    format!("{:.5}", *count as f64 / attempts)
                } else {
                    "0.00000".to_string()
                }
            })
            .collect();
        let success_ratio = if attempts > 0.0 {
            self.success as f64 / attempts
        } else {
            0.0
        };

        format!(
            "{label}\t{}\t{}\t{:?}\t{qps:8.0}\t{avg:8?}\t{}\t{success_ratio}",
            self.success,
            self.fail,
            self.total_time,
            ratios.join("\t"),
        )
    }
}

/// Builder for [`Benchmarker`].
pub struct BenchmarkerBuilder<K, V> {
    thresholds: Vec<Duration>,
    schedule: Vec<ScheduleItem>,
    client: Option<Arc<KvClient<K, V>>>,
    source: Option<Arc<dyn Source<K, V>>>,
}

impl<K, V> BenchmarkerBuilder<K, V> {
    /// Create a builder with the default threshold list and empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            thresholds: default_thresholds(),
            schedule: Vec::new(),
            client: None,
            source: None,
        }
    }

    /// Replace the latency threshold list.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Vec<Duration>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Vec<ScheduleItem>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the client under test.
    #[must_use]
    pub fn with_client(mut self, client: Arc<KvClient<K, V>>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the preload source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn Source<K, V>>) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the benchmarker.
    ///
    /// # Errors
    ///
    /// [`CacheError::Config`](crate::CacheError::Config) when the client or
    /// source is missing.
    pub fn build(self) -> CacheResult<Benchmarker<K, V>> {
        let client = self
            .client
            .ok_or_else(|| crate::CacheError::Config("no client configured".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| crate::CacheError::Config("no source configured".to_string()))?;

        Ok(Benchmarker {
            thresholds: self.thresholds,
            schedule: self.schedule,
            client,
            source,
        })
    }
}

impl<K, V> Default for BenchmarkerBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedule-driven benchmark over a tiered client.
pub struct Benchmarker<K, V> {
    thresholds: Vec<Duration>,
    schedule: Vec<ScheduleItem>,
    client: Arc<KvClient<K, V>>,
    source: Arc<dyn Source<K, V>>,
}

impl<K, V> Benchmarker<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Preload the working set and run every schedule window, printing one
    /// report row per mode × operation kind.
    ///
    /// # Errors
    ///
    /// Preload failures.
    pub async fn run(&self) -> CacheResult<()> {
        let sink = Arc::new(MemSink::new());
        Loader::new(Arc::clone(&self.source), sink.clone())
            .load()
            .await?;

        let records = Arc::new(sink.take_records());
        info!(records = records.len(), "working set preloaded");

        let headers: Vec<String> = self
            .thresholds
            .iter()
            .map(|threshold| format!("{threshold:?}"))
            .collect();
        println!(
            "\t\tsucc\tfail\ttotal_time\t{:>8}\t{:>8}\t{}\tsucc%",
            "qps",
            "res_time",
            headers.join("\t")
        );

        let total = records.len();
        for item in &self.schedule {
            for _ in 0..item.times.max(1) {
                let lo = item.start_percent * total / 100;
                let hi = item.end_percent * total / 100;
                self.run_window(item.readers, item.writers, Arc::clone(&records), lo, hi)
                    .await;
            }
        }

        Ok(())
    }

    /// Replay `records[lo..hi]` sharded across `readers + writers` workers.
    async fn run_window(
        &self,
        readers: usize,
        writers: usize,
        records: Arc<Vec<Record<K, V>>>,
        lo: usize,
        hi: usize,
    ) {
        let workers = readers + writers;
        let len = hi.saturating_sub(lo);
        if workers == 0 || len == 0 {
            return;
        }

        let mut tasks: JoinSet<Kpi> = JoinSet::new();
        for worker in 0..workers {
            let shard_lo = lo + worker * len / workers;
            let shard_hi = lo + (worker + 1) * len / workers;
            let is_reader = worker < readers;
            let client = Arc::clone(&self.client);
            let records = Arc::clone(&records);
            let thresholds = self.thresholds.clone();
            tasks.spawn(async move {
                let mut kpi = Kpi::new(if is_reader { "Get" } else { "Set" }, thresholds.len());
                for record in &records[shard_lo..shard_hi] {
                    let start = Instant::now();
                    let ok = if is_reader {
                        client.get(&record.key).await.is_ok()
                    } else {
                        client.set(&record.key, &record.val).await.is_ok()
                    };
                    if ok {
                        kpi.observe(start.elapsed(), &thresholds);
                    } else {
                        kpi.fail += 1;
                    }
                }
                kpi
            });
        }

        let mut merged: BTreeMap<&'static str, Kpi> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let Ok(kpi) = joined else {
                continue;
            };
            merged
                .entry(kpi.op)
                .and_modify(|slot| slot.merge(&kpi))
                .or_insert(kpi);
        }

        let mode = match (readers, writers) {
            (0, writers) => format!("Set-{writers}"),
            (readers, 0) => format!("Get-{readers}"),
            (readers, writers) => format!("Get-{readers}-Set-{writers}"),
        };
        for (op, kpi) in &merged {
            println!("{}", kpi.render(&format!("{mode}-{op}")));
        }
    }
}
