//! Integration tests for the load pipeline: sources, sinks, coders, and the
//! loader's ordered shutdown.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use tierkv::backends::DashMapCache;
use tierkv::loader::{
    ClientSink, ClientSinkConfig, FakeSource, FakeSourceConfig, FileSink, FileSinkConfig,
    FileSource, FileSourceConfig, FsObjectStore, Loader, MemSink, ObjectSource,
    ObjectSourceConfig, TsvCoder,
};
use tierkv::{Coder, Record};

#[tokio::test]
async fn fake_source_fills_a_memory_sink() {
    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        thread_num: 4,
        total: 100,
        key_len: 36,
        val_len: 23,
    }));
    let sink = Arc::new(MemSink::new());

    Loader::new(source, sink.clone()).load().await.unwrap();

    let records = sink.take_records();
    assert_eq!(records.len(), 100);
    assert!(records.iter().all(|record| record.key.message.len() == 36));
    assert!(records.iter().all(|record| record.val.message.len() == 23));
}

#[test]
fn tsv_coder_round_trips_and_rejects_malformed_lines() {
    let coder = TsvCoder;

    let record = coder.decode("alpha\tbeta").unwrap();
    assert_eq!(record, Record::new(key("alpha"), val("beta")));

    let encoded = coder.encode(&record).unwrap();
    assert_eq!(encoded, "alpha\tbeta");
    assert_eq!(coder.decode(&encoded).unwrap(), record);

    assert!(coder.decode("no-tab-here").is_err());
    assert!(coder.decode("a\tb\tc").is_err());
}

#[tokio::test]
async fn file_sink_then_file_source_round_trips() {
    let dir = scratch_dir("file-roundtrip");

    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        thread_num: 3,
        total: 50,
        ..FakeSourceConfig::default()
    }));
    let staging = Arc::new(MemSink::new());
    Loader::new(source, staging.clone()).load().await.unwrap();
    let records = staging.take_records();

    // Write the working set out as sharded line files...
    let sink = Arc::new(FileSink::new(
        FileSinkConfig {
            file_path: dir.join("out"),
            file_num: 3,
        },
        Arc::new(TsvCoder),
    ));
    Loader::new(Arc::new(VecSource::new(records.clone())), sink)
        .load()
        .await
        .unwrap();

    // ...and read them back.
    let reread = Arc::new(MemSink::new());
    let file_source = Arc::new(FileSource::new(
        FileSourceConfig {
            directory: dir.clone(),
            thread_num: 2,
        },
        Arc::new(TsvCoder),
    ));
    Loader::new(file_source, reread.clone()).load().await.unwrap();

    let expected: HashSet<(String, String)> = records
        .into_iter()
        .map(|record| (record.key.message, record.val.message))
        .collect();
    let actual: HashSet<(String, String)> = reread
        .take_records()
        .into_iter()
        .map(|record| (record.key.message, record.val.message))
        .collect();
    assert_eq!(actual, expected);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn object_source_requires_the_success_marker() {
    let root = scratch_dir("object-no-marker");
    let listing = root.join("exports/20260801");
    std::fs::create_dir_all(&listing).unwrap();
    std::fs::write(listing.join("part-0"), "k\tv\n").unwrap();

    let source = Arc::new(ObjectSource::new(
        ObjectSourceConfig {
            prefix: "exports".to_string(),
            suffix: "20260801".to_string(),
            ..ObjectSourceConfig::default()
        },
        Arc::new(FsObjectStore::new(root.clone())),
        Arc::new(TsvCoder),
    ));
    let sink = Arc::new(MemSink::new());

    assert!(Loader::new(source, sink).load().await.is_err());

    std::fs::remove_dir_all(&root).ok();
}

#[tokio::test]
async fn object_source_shards_partition_the_listing() {
    let root = scratch_dir("object-shards");
    let listing = root.join("exports/20260801");
    std::fs::create_dir_all(&listing).unwrap();
    std::fs::write(listing.join("_SUCCESS"), "").unwrap();

    let mut total_lines = 0;
    for part in 0..8 {
        let mut body = String::new();
        for line in 0..5 {
            body.push_str(&format!("key-{part}-{line}\tval-{part}-{line}\n"));
            total_lines += 1;
        }
        // One malformed line per object; decoded as an error and skipped.
        body.push_str("malformed line without a tab\n");
        std::fs::write(listing.join(format!("part-{part}")), body).unwrap();
    }

    let mut shard_keys: Vec<HashSet<String>> = Vec::new();
    for shard_idx in 0..2 {
        let source = Arc::new(ObjectSource::new(
            ObjectSourceConfig {
                prefix: "exports".to_string(),
                suffix: "20260801".to_string(),
                thread_num: 3,
                shards: 2,
                shard_idx,
            },
            Arc::new(FsObjectStore::new(root.clone())),
            Arc::new(TsvCoder),
        ));
        let sink = Arc::new(MemSink::new());
        Loader::new(source, sink.clone()).load().await.unwrap();
        shard_keys.push(
            sink.take_records()
                .into_iter()
                .map(|record| record.key.message)
                .collect(),
        );
    }

    // The two shards are disjoint and together cover every decodable line.
    assert!(shard_keys[0].is_disjoint(&shard_keys[1]));
    assert_eq!(shard_keys[0].len() + shard_keys[1].len(), total_lines);

    std::fs::remove_dir_all(&root).ok();
}

#[tokio::test]
async fn client_sink_flushes_full_and_residual_batches() {
    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        thread_num: 2,
        total: 37,
        ..FakeSourceConfig::default()
    }));
    let staging = Arc::new(MemSink::new());
    Loader::new(source, staging.clone()).load().await.unwrap();
    let records = staging.take_records();

    let tier = Arc::new(DashMapCache::default());
    let client = Arc::new(client_over(vec![tier]));
    let sink = Arc::new(ClientSink::new(
        ClientSinkConfig {
            thread_num: 3,
            batch: 10,
        },
        client.clone(),
    ));
    // 37 records over batch 10 forces both threshold and residual flushes.
    Loader::new(Arc::new(VecSource::new(records.clone())), sink)
        .load()
        .await
        .unwrap();

    for record in &records {
        assert_eq!(client.get(&record.key).await.unwrap(), Some(record.val.clone()));
    }
}

#[tokio::test]
async fn loader_drains_everything_before_returning() {
    let source = Arc::new(FakeSource::new(FakeSourceConfig {
        thread_num: 8,
        total: 5000,
        ..FakeSourceConfig::default()
    }));
    let sink = Arc::new(MemSink::new());

    Loader::new(source, sink.clone()).load().await.unwrap();

    // Every produced record is in the sink the moment load() returns; no
    // worker is still writing.
    assert_eq!(sink.len(), 5000);
}
