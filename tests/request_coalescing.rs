//! Tests that concurrent identical requests collapse into one upstream call.
//!
//! The deduplicator is the component standing between a burst of identical
//! page loads and a thundering herd against the upstream API, so these tests
//! drive it the way route handlers do: many tasks, one key, a slow fetcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pitchside::cache::dedup::{DEFAULT_DEDUP_WINDOW, Deduplicator};
use tokio::sync::Notify;

/// A fetcher that counts invocations and holds until released, standing in
/// for a slow upstream call.
fn slow_fetcher(
    calls: Arc<AtomicUsize>,
    release: Arc<Notify>,
    value: &str,
) -> impl Future<Output = Result<Arc<String>, String>> + Send + 'static {
    let value = value.to_owned();
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        release.notified().await;
        Ok(Arc::new(value))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_concurrent_callers_one_upstream_call() {
    let dedup: Deduplicator<Arc<String>, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());
    let started = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..100 {
        let dedup = dedup.clone();
        let fetcher = slow_fetcher(Arc::clone(&calls), Arc::clone(&release), "payload");
        let started = Arc::clone(&started);
        handles.push(tokio::spawn(async move {
            started.fetch_add(1, Ordering::SeqCst);
            dedup.dedupe(r#"fixtures:{"league":"39"}"#, move || fetcher).await
        }));
    }

    // Wait until every caller has had the chance to register or join.
    while started.load(Ordering::SeqCst) < 100 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_waiters();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1, "fetcher ran exactly once");
    assert_eq!(results.len(), 100);
    // Every caller got the identical resolved value, not a per-caller copy.
    for result in &results {
        assert!(Arc::ptr_eq(result, &results[0]));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_keys_fetch_independently() {
    let dedup: Deduplicator<Arc<String>, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    let first = {
        let dedup = dedup.clone();
        let fetcher = slow_fetcher(Arc::clone(&calls), Arc::clone(&release), "standings");
        tokio::spawn(async move { dedup.dedupe("standings:{}", move || fetcher).await })
    };
    let second = {
        let dedup = dedup.clone();
        let fetcher = slow_fetcher(Arc::clone(&calls), Arc::clone(&release), "fixtures");
        tokio::spawn(async move { dedup.dedupe("fixtures:{}", move || fetcher).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2, "one fetch per key");
    release.notify_waiters();

    assert_eq!(*first.await.unwrap().unwrap(), "standings");
    assert_eq!(*second.await.unwrap().unwrap(), "fixtures");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_fans_out_then_key_recovers() {
    let dedup: Deduplicator<Arc<String>, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let dedup = dedup.clone();
        let calls = Arc::clone(&calls);
        let release = Arc::clone(&release);
        handles.push(tokio::spawn(async move {
            dedup
                .dedupe("fixtures:{}", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Err::<Arc<String>, _>("upstream returned status 500".to_owned())
                })
                .await
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_waiters();

    // All waiters observe the same rejection.
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap_err(), "upstream returned status 500");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The settled entry is unregistered, so the key is retried, not poisoned.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while dedup.stats().pending_count > 0 {
        assert!(tokio::time::Instant::now() < deadline, "registry entry leaked");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let retried = dedup
        .dedupe("fixtures:{}", {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(Arc::new("recovered".to_owned()))
            }
        })
        .await;
    assert_eq!(*retried.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
