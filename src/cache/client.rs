//! Fetch orchestration: dedupe → cache lookup → upstream fetch → TTL
//! computation → fire-and-forget cache write.
//!
//! The orchestrator owns no state of its own; everything observable happens
//! through the store and the deduplicator. Because cache writes are
//! detached, a same-key read issued immediately after a fetch returns may
//! still miss — an accepted weak-consistency window, not a bug.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::dedup::{
    DEFAULT_DEDUP_WINDOW, DEFAULT_SWEEP_INTERVAL, DedupStats, Deduplicator,
};
use crate::cache::key::{build_key, params_key};
use crate::cache::store::{CacheStats, CacheStore};
use crate::cache::ttl::ttl_for_payload;
use crate::football::{FootballApi, FootballApiError};

#[derive(Clone)]
pub struct CachedClient {
    api: Arc<FootballApi>,
    store: CacheStore,
    dedup: Deduplicator<Arc<Value>, FootballApiError>,
}

impl CachedClient {
    pub fn new(api: Arc<FootballApi>, store: CacheStore) -> Self {
        let dedup = Deduplicator::new(DEFAULT_DEDUP_WINDOW);
        dedup.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);
        Self { api, store, dedup }
    }

    /// Fetch an upstream endpoint through the cache.
    ///
    /// All concurrent callers for the same `(endpoint, params)` identity
    /// converge on a single execution. An explicit `ttl_override` wins over
    /// the adaptive policy; an override of exactly 0 bypasses the persistent
    /// store entirely (always fetch fresh, never read or write it).
    pub async fn fetch_cached(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
        ttl_override: Option<i64>,
    ) -> Result<Arc<Value>, FootballApiError> {
        let params_key = params_key(params);
        let key = build_key(endpoint, params);

        let this = self.clone();
        let endpoint = endpoint.to_owned();
        let params = params.clone();
        self.dedup
            .dedupe(&key, move || async move {
                let bypass_store = ttl_override == Some(0);

                if !bypass_store
                    && let Some(hit) = this.store.get_by_key(&endpoint, &params_key).await
                {
                    return Ok(Arc::new(hit));
                }

                let payload = Arc::new(this.api.get(&endpoint, &params).await?);

                if !bypass_store {
                    let ttl = effective_ttl(ttl_override, &endpoint, &payload, Utc::now());
                    this.store
                        .put_detached(endpoint, params_key, Arc::clone(&payload), ttl);
                }

                Ok(payload)
            })
            .await
    }

    /// Coalesce an arbitrary in-process operation under `key` without
    /// touching the persistent store. For call sites whose data is
    /// re-derived per request and only needs burst protection.
    pub async fn dedupe<F, Fut>(&self, key: &str, operation: F) -> Result<Arc<Value>, FootballApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<Value>, FootballApiError>> + Send + 'static,
    {
        self.dedup.dedupe(key, operation).await
    }

    /// Drop cached entries: exact key, whole endpoint, or everything.
    pub async fn invalidate(
        &self,
        endpoint: Option<&str>,
        params: Option<&BTreeMap<String, String>>,
    ) -> Result<u64, sqlx::Error> {
        let params_key = params.map(params_key);
        self.store.invalidate(endpoint, params_key.as_deref()).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, sqlx::Error> {
        self.store.stats().await
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.dedup.stats()
    }
}

/// The TTL actually applied on a write: a positive explicit override, else
/// the adaptive classification of the payload.
fn effective_ttl(
    ttl_override: Option<i64>,
    endpoint: &str,
    payload: &Value,
    now: DateTime<Utc>,
) -> i64 {
    match ttl_override {
        Some(ttl) if ttl > 0 => ttl,
        _ => ttl_for_payload(endpoint, payload, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ttl::{TTL_FINISHED, TTL_LIVE, TTL_STANDINGS};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-07T12:00:00+00:00")
            .unwrap()
            .to_utc()
    }

    #[test]
    fn explicit_override_wins_over_adaptive() {
        let live = json!({"response": [{"fixture": {"status": {"short": "1H"}}}]});
        assert_eq!(effective_ttl(Some(7200), "fixtures", &live, now()), 7200);
    }

    #[test]
    fn absent_override_uses_adaptive_policy() {
        let live = json!({"response": [{"fixture": {"status": {"short": "1H"}}}]});
        assert_eq!(effective_ttl(None, "fixtures", &live, now()), TTL_LIVE);

        let finished = json!({"response": [{"fixture": {"status": {"short": "FT"}}}]});
        assert_eq!(effective_ttl(None, "fixtures", &finished, now()), TTL_FINISHED);

        assert_eq!(effective_ttl(None, "standings", &json!({}), now()), TTL_STANDINGS);
    }

    #[test]
    fn zero_and_negative_overrides_fall_back_to_adaptive() {
        // A zero override never reaches a write (the fetch path bypasses the
        // store), so the fallback here only matters for nonsense inputs.
        let finished = json!({"response": [{"fixture": {"status": {"short": "FT"}}}]});
        assert_eq!(effective_ttl(Some(0), "fixtures", &finished, now()), TTL_FINISHED);
        assert_eq!(effective_ttl(Some(-5), "fixtures", &finished, now()), TTL_FINISHED);
    }
}
