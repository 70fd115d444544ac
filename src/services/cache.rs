//! Response caching for grid queries.
//!
//! A grid query whose window ended before the current local time covers
//! history that the backend will not change, so its rows are cached until the
//! TTL expires. A window that reaches the present is always fetched, since new
//! events keep arriving for it.
//!
//! | Query window | Caching |
//! |--------------|---------|
//! | Ends in the past | TTL, weighted by row count |
//! | Ends now or later | never cached |

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use moka::future::Cache;

use crate::config::Config;
use crate::hires::{ApiError, EventApi, EventRecord, TimelineOptions};
use crate::query::{GridQuery, TimelineQuery};

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:` separator. Empty components are included
/// to ensure different queries produce different keys.
#[must_use]
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

/// Cache key for a grid query: the endpoint name plus its query parameters.
#[must_use]
pub fn grid_key(query: &GridQuery) -> String {
    let params = query.params();
    let components: Vec<&str> = params.iter().map(|(_, v)| v.as_str()).collect();
    cache_key("hiresgrid", &components)
}

/// `true` if the query window lies entirely before `now`.
#[must_use]
pub fn is_historical(query: &GridQuery, now: NaiveDateTime) -> bool {
    query.end() < now
}

/// An [`EventApi`] that serves historical grid windows from memory.
pub struct CachingApi<A> {
    inner: A,
    grid_cache: Cache<String, Arc<Vec<EventRecord>>>,
}

impl<A: EventApi> CachingApi<A> {
    pub fn new(inner: A, config: &Config) -> Self {
        // Weighted by row count, not entry count
        let grid_cache = Cache::builder()
            .weigher(|_key: &String, rows: &Arc<Vec<EventRecord>>| -> u32 {
                rows.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(config.cache_max_rows)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self { inner, grid_cache }
    }

    async fn cached_grid(
        &self,
        query: &GridQuery,
        now: NaiveDateTime,
    ) -> Result<Vec<EventRecord>, ApiError> {
        if !is_historical(query, now) {
            return self.inner.grid(query).await;
        }

        let key = grid_key(query);
        if let Some(rows) = self.grid_cache.get(&key).await {
            tracing::debug!(key = %key, rows = rows.len(), "Grid cache hit");
            return Ok((*rows).clone());
        }

        let rows = self.inner.grid(query).await?;
        tracing::debug!(key = %key, rows = rows.len(), "Caching historical grid window");
        self.grid_cache.insert(key, Arc::new(rows.clone())).await;
        Ok(rows)
    }
}

impl<A: EventApi> EventApi for CachingApi<A> {
    async fn locations(&self) -> Result<serde_json::Value, ApiError> {
        self.inner.locations().await
    }

    async fn grid(&self, query: &GridQuery) -> Result<Vec<EventRecord>, ApiError> {
        self.cached_grid(query, Local::now().naive_local()).await
    }

    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelineOptions, ApiError> {
        self.inner.timeline(query).await
    }
}
