//! Integration tests for the benchmark driver.

mod common;

use std::sync::Arc;

use common::*;
use tierkv::backends::DashMapCache;
use tierkv::loader::{FakeSource, FakeSourceConfig};
use tierkv::{BenchmarkerBuilder, ScheduleItem};

#[tokio::test]
async fn benchmark_replays_the_working_set() {
    let client = Arc::new(client_over(vec![Arc::new(DashMapCache::default())]));
    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        thread_num: 2,
        total: 60,
        ..FakeSourceConfig::default()
    }));

    let benchmarker = BenchmarkerBuilder::new()
        .with_schedule(vec![ScheduleItem {
            readers: 2,
            writers: 2,
            start_percent: 0,
            end_percent: 100,
            times: 2,
        }])
        .with_client(client.clone())
        .with_source(source)
        .build()
        .unwrap();

    benchmarker.run().await.unwrap();

    // Two repetitions of 30 reads and 30 writes each hit the single tier.
    let (gets, _) = client.tier_counters()[0];
    assert_eq!(gets, 60);
}

#[tokio::test]
async fn benchmark_with_an_empty_schedule_only_preloads() {
    let client = Arc::new(client_over(vec![Arc::new(DashMapCache::default())]));
    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        total: 10,
        ..FakeSourceConfig::default()
    }));

    let benchmarker = BenchmarkerBuilder::new()
        .with_schedule(Vec::new())
        .with_client(client.clone())
        .with_source(source)
        .build()
        .unwrap();

    benchmarker.run().await.unwrap();
    assert_eq!(client.tier_counters()[0], (0, 0));
}

#[tokio::test]
async fn benchmark_builder_requires_client_and_source() {
    let missing_client: tierkv::CacheResult<_> =
        BenchmarkerBuilder::<tierkv::codecs::PlainKey, tierkv::codecs::PlainValue>::new().build();
    assert!(missing_client.is_err());
}
