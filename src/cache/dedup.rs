//! In-process request deduplication.
//!
//! Concurrent callers asking for the same key within the dedup window all
//! await one shared future and observe the identical resolution or
//! rejection — at most one upstream execution per key per process. The
//! registry entry is removed the instant the operation settles, success or
//! failure, so a rejected operation never poisons later attempts.
//!
//! The deduplicator is an explicitly constructed component, not a global:
//! each instance owns its registry, and its sweeper task holds only a weak
//! reference, so dropping the last handle ends the sweeper.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use tracing::debug;

/// How long a new caller may join an already in-flight operation.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5);

/// How often aged registry entries are swept out.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

type SharedOp<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Pending<T, E> {
    started_at: Instant,
    op: SharedOp<T, E>,
}

struct Inner<T, E> {
    pending: DashMap<String, Pending<T, E>>,
    window: Duration,
}

/// Observability counters for the registry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DedupStats {
    pub pending_count: usize,
    pub oldest_age_ms: u64,
}

pub struct Deduplicator<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Deduplicator<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Deduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: DashMap::new(),
                window,
            }),
        }
    }

    /// Run `operation` under `key`, coalescing with any in-flight operation
    /// registered less than the window ago.
    ///
    /// The operation is driven to completion by a detached task even if every
    /// public caller is cancelled — joining an in-flight fetch never cancels
    /// it — and that same task removes the registry entry once the operation
    /// settles.
    pub async fn dedupe<F, Fut>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let op = match self.inner.pending.entry(key.to_owned()) {
            Entry::Occupied(occupied)
                if occupied.get().started_at.elapsed() < self.inner.window =>
            {
                debug!(key, "joined in-flight request");
                occupied.get().op.clone()
            }
            entry => {
                // Absent, or aged past the window: start fresh under this key.
                let op = operation().boxed().shared();
                entry.insert(Pending {
                    started_at: Instant::now(),
                    op: op.clone(),
                });
                self.spawn_cleanup(key.to_owned(), op.clone());
                op
            }
        };

        op.await
    }

    /// Drive the operation and unregister it when it settles. The identity
    /// check makes this safe against the sweep racing us: a newer operation
    /// registered under the same key is never removed by an older cleanup.
    fn spawn_cleanup(&self, key: String, op: SharedOp<T, E>) {
        let inner = Arc::downgrade(&self.inner);
        let marker = op.clone();
        tokio::spawn(async move {
            let _ = op.await;
            if let Some(inner) = inner.upgrade() {
                inner.pending.remove_if(&key, |_, p| p.op.ptr_eq(&marker));
            }
        });
    }

    /// Periodically drop entries older than the window, bounding registry
    /// growth if an operation hangs. The underlying operation is not
    /// cancelled; new callers just stop joining it.
    pub fn spawn_sweeper(&self, interval: Duration) {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else { break };
                let before = inner.pending.len();
                inner.pending.retain(|_, p| p.started_at.elapsed() <= inner.window);
                let removed = before.saturating_sub(inner.pending.len());
                if removed > 0 {
                    debug!(removed, "swept aged in-flight entries");
                }
            }
        });
    }

    pub fn stats(&self) -> DedupStats {
        let oldest_age_ms = self
            .inner
            .pending
            .iter()
            .map(|p| p.started_at.elapsed().as_millis() as u64)
            .max()
            .unwrap_or(0);
        DedupStats {
            pending_count: self.inner.pending.len(),
            oldest_age_ms,
        }
    }
}

impl<T, E> Default for Deduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn counting_op(
        calls: &Arc<AtomicUsize>,
        gate: &Arc<Notify>,
        value: &str,
    ) -> impl Future<Output = Result<String, String>> + Send + 'static {
        let calls = Arc::clone(calls);
        let gate = Arc::clone(gate);
        let value = value.to_owned();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn concurrent_callers_converge_on_one_execution() {
        let dedup: Deduplicator<String, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..100 {
            let dedup = dedup.clone();
            let op = counting_op(&calls, &gate, "payload");
            handles.push(tokio::spawn(async move {
                dedup.dedupe("fixtures:{}", move || op).await
            }));
        }

        // Let every caller register or join before releasing the operation.
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one execution started");
        gate.notify_waiters();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "payload");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let dedup: Deduplicator<String, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let calls = Arc::clone(&calls);
            dedup.dedupe("k1", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("a".to_owned())
            })
        };
        let b = {
            let calls = Arc::clone(&calls);
            dedup.dedupe("k2", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("b".to_owned())
            })
        };

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), "a");
        assert_eq!(b.unwrap(), "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejection_fans_out_and_does_not_poison_the_key() {
        let dedup: Deduplicator<String, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = Arc::clone(&calls);
            dedup.dedupe("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>("boom".to_owned())
            })
        };
        assert_eq!(failing.await.unwrap_err(), "boom");

        // Wait for the cleanup task to unregister the settled operation.
        tokio::task::yield_now().await;
        let deadline = Instant::now() + Duration::from_secs(1);
        while dedup.stats().pending_count > 0 {
            assert!(Instant::now() < deadline, "registry entry leaked after rejection");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let retried = {
            let calls = Arc::clone(&calls);
            dedup.dedupe("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("recovered".to_owned())
            })
        };
        assert_eq!(retried.await.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn entry_past_the_window_is_not_joined() {
        let dedup: Deduplicator<String, String> = Deduplicator::new(Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let hung = {
            let dedup = dedup.clone();
            let op = counting_op(&calls, &gate, "old");
            tokio::spawn(async move { dedup.dedupe("k", move || op).await })
        };
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Window elapsed: this caller starts a fresh operation instead of joining.
        let fresh = {
            let calls = Arc::clone(&calls);
            dedup.dedupe("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("new".to_owned())
            })
        };
        assert_eq!(fresh.await.unwrap(), "new");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The original operation was not cancelled and still resolves.
        gate.notify_waiters();
        assert_eq!(hung.await.unwrap().unwrap(), "old");
    }

    #[tokio::test]
    async fn sweeper_drops_aged_entries_without_cancelling() {
        let dedup: Deduplicator<String, String> = Deduplicator::new(Duration::from_millis(20));
        dedup.spawn_sweeper(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let hung = {
            let dedup = dedup.clone();
            let op = counting_op(&calls, &gate, "slow");
            tokio::spawn(async move { dedup.dedupe("k", move || op).await })
        };

        let deadline = Instant::now() + Duration::from_secs(1);
        while dedup.stats().pending_count > 0 {
            assert!(Instant::now() < deadline, "sweeper never removed the aged entry");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        gate.notify_waiters();
        assert_eq!(hung.await.unwrap().unwrap(), "slow");
    }

    #[tokio::test]
    async fn stats_report_pending_age() {
        let dedup: Deduplicator<String, String> = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
        assert_eq!(dedup.stats().pending_count, 0);
        assert_eq!(dedup.stats().oldest_age_ms, 0);

        let gate = Arc::new(Notify::new());
        let pending = {
            let dedup = dedup.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                dedup
                    .dedupe("k", move || async move {
                        gate.notified().await;
                        Ok::<_, String>("done".to_owned())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = dedup.stats();
        assert_eq!(stats.pending_count, 1);
        assert!(stats.oldest_age_ms >= 10);

        gate.notify_waiters();
        assert_eq!(pending.await.unwrap().unwrap(), "done");
    }
}
