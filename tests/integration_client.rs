//! Integration tests for the tiered client: read-through promotion,
//! negative memoization, write fan-out, conditional writes, and telemetry.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use tierkv::backends::DashMapCache;
use tierkv::codecs::PlainValue;
use tierkv::{CacheBackend, CacheError};

#[cfg(feature = "moka")]
use tierkv::backends::{MokaCache, MokaCacheConfig};

#[tokio::test]
async fn set_then_get_round_trips() {
    let client = client_over(vec![
        Arc::new(DashMapCache::default()),
        Arc::new(DashMapCache::default()),
    ]);

    client.set(&key("user:1"), &val("alice")).await.unwrap();
    assert_eq!(client.get(&key("user:1")).await.unwrap(), Some(val("alice")));
}

#[tokio::test]
async fn del_then_get_misses() {
    let client = client_over(vec![
        Arc::new(DashMapCache::default()),
        Arc::new(DashMapCache::default()),
    ]);

    client.set(&key("user:2"), &val("bob")).await.unwrap();
    client.del(&key("user:2")).await.unwrap();
    assert_eq!(client.get(&key("user:2")).await.unwrap(), None);
}

#[tokio::test]
async fn hit_on_back_tier_promotes_to_front() {
    let front = Arc::new(DashMapCache::default());
    let back = Arc::new(DashMapCache::default());
    back.set("user:3", b"carol").await.unwrap();

    let client = client_over(vec![front.clone(), back.clone()]);

    // First read hits the back tier and back-fills the front.
    assert_eq!(client.get(&key("user:3")).await.unwrap(), Some(val("carol")));
    assert_eq!(client.tier_counters(), vec![(1, 0), (1, 1)]);
    assert_eq!(front.get("user:3").await.unwrap(), Some(b"carol".to_vec()));

    // Second read answers from the front; the back tier is not consulted.
    assert_eq!(client.get(&key("user:3")).await.unwrap(), Some(val("carol")));
    assert_eq!(client.tier_counters(), vec![(2, 1), (1, 1)]);

    let rates = client.cache_hit_rate();
    assert!((rates[0] - 0.5).abs() < f64::EPSILON);
    assert!((rates[1] - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn full_miss_memoizes_negative_in_front_tiers_only() {
    let front = Arc::new(DashMapCache::default());
    let back = Arc::new(DashMapCache::default());
    let client = client_over(vec![front.clone(), back.clone()]);

    assert_eq!(client.get(&key("missing")).await.unwrap(), None);
    assert_eq!(client.tier_counters(), vec![(1, 0), (1, 0)]);
    // Front tier carries the sentinel, the authoritative tier stays clean.
    assert_eq!(front.get("missing").await.unwrap(), Some(Vec::new()));
    assert_eq!(back.get("missing").await.unwrap(), None);

    // Second read stops at the memoized negative; a sentinel match is not a
    // hit and the back tier is not consulted again.
    assert_eq!(client.get(&key("missing")).await.unwrap(), None);
    assert_eq!(client.tier_counters(), vec![(2, 0), (1, 0)]);
}

#[tokio::test]
async fn set_fan_out_short_circuits_at_first_failure() {
    let failing = Arc::new(ScriptedBackend {
        fail_set: true,
        ..ScriptedBackend::default()
    });
    let back = Arc::new(DashMapCache::default());
    let client = client_over(vec![failing.clone(), back.clone()]);

    let err = client.set(&key("user:4"), &val("dave")).await.unwrap_err();
    assert!(matches!(err, CacheError::Backend(_)));
    assert_eq!(failing.set_calls.load(Ordering::Relaxed), 1);
    // The tier behind the failure was never written.
    assert_eq!(back.get("user:4").await.unwrap(), None);
}

#[tokio::test]
async fn set_nx_reports_the_authoritative_tier() {
    // The front tier claims "already present"; that answer is advisory and
    // must not mask the authoritative insert.
    let front = Arc::new(ScriptedBackend {
        set_nx_reply: Some(false),
        ..ScriptedBackend::default()
    });
    let back = Arc::new(DashMapCache::default());
    let client = client_over(vec![front, back.clone()]);

    assert!(client.set_nx(&key("user:5"), &val("erin")).await.unwrap());
    assert_eq!(back.get("user:5").await.unwrap(), Some(b"erin".to_vec()));

    // Now genuinely present in the authoritative tier.
    assert!(!client.set_nx(&key("user:5"), &val("other")).await.unwrap());
    assert_eq!(back.get("user:5").await.unwrap(), Some(b"erin".to_vec()));
}

#[tokio::test]
async fn promotion_failures_are_swallowed() {
    // The front tier rejects every write; the lookup must still succeed and
    // the back tier's answer must come through untouched.
    let front = Arc::new(ScriptedBackend {
        fail_set: true,
        ..ScriptedBackend::default()
    });
    let back = Arc::new(DashMapCache::default());
    back.set("user:9", b"heidi").await.unwrap();

    let client = client_over(vec![front.clone(), back]);
    assert_eq!(client.get(&key("user:9")).await.unwrap(), Some(val("heidi")));
    // The promotion was attempted and failed; nothing landed in the front.
    assert_eq!(front.set_calls.load(Ordering::Relaxed), 1);
    assert!(front.store.is_empty());

    // Same for the negative memo on a full miss.
    assert_eq!(client.get(&key("user:10")).await.unwrap(), None);
    assert_eq!(front.set_calls.load(Ordering::Relaxed), 2);
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn set_ex_nx_inserts_only_once_and_expires() {
    let client = client_over(vec![
        Arc::new(MokaCache::new(MokaCacheConfig::default())),
        Arc::new(MokaCache::new(MokaCacheConfig::default())),
    ]);

    let ttl = Duration::from_millis(80);
    assert!(client.set_ex_nx(&key("lock"), &val("owner-a"), ttl).await.unwrap());
    assert!(!client.set_ex_nx(&key("lock"), &val("owner-b"), ttl).await.unwrap());
    assert_eq!(client.get(&key("lock")).await.unwrap(), Some(val("owner-a")));

    // After expiry the slot opens up again.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(client.set_ex_nx(&key("lock"), &val("owner-b"), ttl).await.unwrap());
}

#[tokio::test]
async fn set_ex_surfaces_unsupported_tiers() {
    // DashMap tiers have no per-entry TTL; the whole operation must fail
    // with the typed error rather than silently skipping the tier.
    let client = client_over(vec![Arc::new(DashMapCache::default())]);

    let err = client
        .set_ex(&key("user:6"), &val("frank"), Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn set_ex_expires_across_tiers() {
    let client = client_over(vec![
        Arc::new(MokaCache::new(MokaCacheConfig::default())),
        Arc::new(MokaCache::new(MokaCacheConfig::default())),
    ]);

    client
        .set_ex(&key("user:7"), &val("grace"), Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(client.get(&key("user:7")).await.unwrap(), Some(val("grace")));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(client.get(&key("user:7")).await.unwrap(), None);
}

#[tokio::test]
async fn batch_length_mismatch_is_a_contract_error_without_io() {
    let front = Arc::new(ScriptedBackend::default());
    let back = Arc::new(DashMapCache::default());
    let client = client_over(vec![front.clone(), back.clone()]);

    let err = client
        .set_batch(&[key("a"), key("b")], &[val("1")])
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Contract(_)));
    assert_eq!(front.set_calls.load(Ordering::Relaxed), 0);
    assert!(back.is_empty());
}

#[tokio::test]
async fn batch_writes_reach_every_tier() {
    let front = Arc::new(DashMapCache::default());
    let back = Arc::new(DashMapCache::default());
    let client = client_over(vec![front.clone(), back.clone()]);

    let keys: Vec<_> = (0..5).map(|i| key(&format!("batch:{i}"))).collect();
    let vals: Vec<_> = (0..5).map(|i| val(&format!("v{i}"))).collect();
    let results = client.set_batch(&keys, &vals).await.unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|entry| entry.is_ok()));

    for (k, v) in keys.iter().zip(&vals) {
        assert_eq!(client.get(k).await.unwrap(), Some(v.clone()));
        assert_eq!(front.get(&k.message).await.unwrap(), Some(v.message.clone().into_bytes()));
    }
}

#[tokio::test]
async fn batch_front_tier_entry_failures_are_swallowed() {
    let front = Arc::new(ScriptedBackend {
        fail_set: true,
        ..ScriptedBackend::default()
    });
    let back = Arc::new(DashMapCache::default());
    let client = client_over(vec![front, back.clone()]);

    let keys = vec![key("x"), key("y")];
    let vals = vec![val("1"), val("2")];
    // The front tier fails every entry; the per-entry vector still comes
    // from the authoritative tier.
    let results = client.set_batch(&keys, &vals).await.unwrap();
    assert!(results.iter().all(|entry| entry.is_ok()));
    assert_eq!(back.get("x").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(back.get("y").await.unwrap(), Some(b"2".to_vec()));
}

#[tokio::test]
async fn custom_sentinel_distinguishes_empty_values() {
    let front = Arc::new(DashMapCache::default());
    let back = Arc::new(DashMapCache::default());
    let client = tierkv::KvClientBuilder::new()
        .with_tiers(vec![front.clone(), back])
        .with_compressor(Box::new(tierkv::codecs::PlainCompressor))
        .with_serializer(Box::new(tierkv::codecs::PlainSerializer))
        .with_nil_val_buf(b"\0tierkv:nil\0".to_vec())
        .build()
        .unwrap();

    // An empty encoded value no longer collides with the sentinel.
    client.set(&key("empty"), &PlainValue::default()).await.unwrap();
    assert_eq!(
        client.get(&key("empty")).await.unwrap(),
        Some(PlainValue::default())
    );

    // Misses memoize the custom sentinel in the front tier.
    assert_eq!(client.get(&key("absent")).await.unwrap(), None);
    assert_eq!(
        front.get("absent").await.unwrap(),
        Some(b"\0tierkv:nil\0".to_vec())
    );
    assert_eq!(client.get(&key("absent")).await.unwrap(), None);
}

#[tokio::test]
async fn backend_read_failure_aborts_the_lookup() {
    let failing = Arc::new(ScriptedBackend {
        fail_get: true,
        ..ScriptedBackend::default()
    });
    let client = client_over(vec![failing, Arc::new(DashMapCache::default())]);

    let err = client.get(&key("user:8")).await.unwrap_err();
    assert!(matches!(err, CacheError::Backend(_)));
}

#[tokio::test]
async fn hit_rate_is_nan_before_any_lookup() {
    let client = client_over(vec![Arc::new(DashMapCache::default())]);
    assert!(client.cache_hit_rate()[0].is_nan());
}

#[tokio::test]
async fn close_sweeps_every_tier_and_surfaces_the_first_failure() {
    let failing = Arc::new(ScriptedBackend {
        fail_close: true,
        ..ScriptedBackend::default()
    });
    let tail = Arc::new(ScriptedBackend::default());
    let client = client_over(vec![failing.clone(), tail.clone()]);

    assert!(client.close().await.is_err());
    assert!(failing.closed.load(Ordering::Relaxed));
    assert!(tail.closed.load(Ordering::Relaxed));
}
