//! Postgres-backed cache for upstream API responses.
//!
//! One row per `(endpoint, params_key)` identity; writes upsert in place.
//! The store is the cross-process convergence point: every service instance
//! reads and writes the same table, so a response fetched by one instance is
//! a hit for all of them.
//!
//! Read failures degrade to a miss (the caller falls through to the
//! upstream), and writes are offered fire-and-forget: a failed cache write
//! is logged and never fails the fetch that produced the payload.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{debug, warn};

use crate::cache::key::params_key;

/// Aggregate counters over the cache table. `valid`/`expired` partition all
/// rows by the same `expires_at > now()` comparison `get` uses.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct CacheStats {
    pub total: i64,
    pub valid: i64,
    pub expired: i64,
    pub total_hits: i64,
}

#[derive(Clone)]
pub struct CacheStore {
    pool: PgPool,
}

impl CacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a fresh entry, bumping its hit counter in the same round trip.
    ///
    /// An expired row is treated as a miss and deleted in the background.
    /// A read error is also treated as a miss so the caller degrades to the
    /// upstream instead of failing.
    pub async fn get(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Option<Value> {
        self.get_by_key(endpoint, &params_key(params)).await
    }

    pub(crate) async fn get_by_key(&self, endpoint: &str, params_key: &str) -> Option<Value> {
        let result = sqlx::query_scalar::<_, Value>(
            r#"
            UPDATE api_cache
            SET hit_count = hit_count + 1
            WHERE endpoint = $1 AND params_key = $2 AND expires_at > now()
            RETURNING payload
            "#,
        )
        .bind(endpoint)
        .bind(params_key)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(payload)) => {
                debug!(endpoint, "cache hit");
                Some(payload)
            }
            Ok(None) => {
                self.delete_expired_detached(endpoint, params_key);
                None
            }
            Err(e) => {
                warn!(endpoint, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Upsert an entry. The previous row for the identity, if any, is
    /// overwritten wholesale — including its hit counter.
    pub async fn put(
        &self,
        endpoint: &str,
        params_key: &str,
        payload: &Value,
        ttl_seconds: i64,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO api_cache (endpoint, params_key, payload, cached_at, expires_at, hit_count)
            VALUES ($1, $2, $3, $4, $5, 0)
            ON CONFLICT (endpoint, params_key)
            DO UPDATE SET payload = EXCLUDED.payload,
                          cached_at = EXCLUDED.cached_at,
                          expires_at = EXCLUDED.expires_at,
                          hit_count = EXCLUDED.hit_count
            "#,
        )
        .bind(endpoint)
        .bind(params_key)
        .bind(Json(payload))
        .bind(now)
        .bind(now + Duration::seconds(ttl_seconds))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fire-and-forget variant of [`put`](Self::put): spawns an independent
    /// task and never blocks or fails the caller. Until the task lands, a
    /// same-key read may still miss — an accepted weak-consistency window.
    pub fn put_detached(
        &self,
        endpoint: String,
        params_key: String,
        payload: Arc<Value>,
        ttl_seconds: i64,
    ) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.put(&endpoint, &params_key, &payload, ttl_seconds).await {
                Ok(()) => debug!(endpoint, ttl_seconds, "cached upstream response"),
                Err(e) => warn!(endpoint, error = %e, "cache write failed"),
            }
        });
    }

    /// Remove entries at one of three granularities: exact key, all entries
    /// for an endpoint, or everything. Returns the number of rows removed.
    pub async fn invalidate(
        &self,
        endpoint: Option<&str>,
        params_key: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = match (endpoint, params_key) {
            (Some(endpoint), Some(params_key)) => {
                sqlx::query("DELETE FROM api_cache WHERE endpoint = $1 AND params_key = $2")
                    .bind(endpoint)
                    .bind(params_key)
                    .execute(&self.pool)
                    .await?
            }
            (Some(endpoint), None) => {
                sqlx::query("DELETE FROM api_cache WHERE endpoint = $1")
                    .bind(endpoint)
                    .execute(&self.pool)
                    .await?
            }
            (None, _) => sqlx::query("DELETE FROM api_cache").execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    pub async fn stats(&self) -> Result<CacheStats, sqlx::Error> {
        sqlx::query_as::<_, CacheStats>(
            r#"
            SELECT count(*)                                            AS total,
                   count(*) FILTER (WHERE expires_at > now())          AS valid,
                   count(*) FILTER (WHERE expires_at <= now())         AS expired,
                   COALESCE(sum(hit_count), 0)::bigint                 AS total_hits
            FROM api_cache
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }

    /// Lazy deletion of an expired row observed during a read.
    fn delete_expired_detached(&self, endpoint: &str, params_key: &str) {
        let store = self.clone();
        let endpoint = endpoint.to_owned();
        let params_key = params_key.to_owned();
        tokio::spawn(async move {
            let result = sqlx::query(
                "DELETE FROM api_cache WHERE endpoint = $1 AND params_key = $2 AND expires_at <= now()",
            )
            .bind(&endpoint)
            .bind(&params_key)
            .execute(&store.pool)
            .await;
            match result {
                Ok(done) if done.rows_affected() > 0 => {
                    debug!(endpoint, "deleted expired cache entry");
                }
                Ok(_) => {}
                Err(e) => warn!(endpoint, error = %e, "failed to delete expired cache entry"),
            }
        });
    }
}
