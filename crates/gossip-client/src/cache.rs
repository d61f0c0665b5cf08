use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Hierarchical cache key, e.g. `["get-post", "P1"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// True when `prefix` matches this key part by part.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Notifications delivered to cache subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A value was stored under this exact key
    Updated(QueryKey),

    /// Entries under this prefix were marked stale
    Invalidated(QueryKey),

    /// Entries under this prefix were dropped
    Removed(QueryKey),
}

struct CacheEntry {
    value: Value,
    stale: bool,
    updated_at: DateTime<Utc>,
}

/// Keyed store of fetched resources with subscriber notification.
///
/// Values are kept as JSON so one cache can hold every resource type.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: DashMap<QueryKey, CacheEntry>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    fn notify(&self, event: CacheEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Store a fresh value under `key`.
    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.inner.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                stale: false,
                updated_at: Utc::now(),
            },
        );
        debug!(%key, "cache set");
        self.notify(CacheEvent::Updated(key));
        Ok(())
    }

    /// Cached value for `key`, fresh or stale.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.inner.entries.get(key)?;
        serde_json::from_value(entry.value.clone()).ok()
    }

    fn get_fresh<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.inner.entries.get(key)?;
        if entry.stale {
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%key, "cached value no longer decodes: {}", e);
                None
            }
        }
    }

    /// `Some(true)` if the entry exists and was invalidated.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.inner.entries.get(key).map(|e| e.stale)
    }

    pub fn updated_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        self.inner.entries.get(key).map(|e| e.updated_at)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Mark every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut matched = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if entry.key().starts_with(prefix) {
                entry.stale = true;
                matched += 1;
            }
        }
        debug!(key = %prefix, matched, "cache invalidate");
        self.notify(CacheEvent::Invalidated(prefix.clone()));
        matched
    }

    /// Drop every entry under `prefix`. Returns how many were removed.
    pub fn reset(&self, prefix: &QueryKey) -> usize {
        let mut removed = 0;
        self.inner.entries.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!(key = %prefix, removed, "cache reset");
        self.notify(CacheEvent::Removed(prefix.clone()));
        removed
    }

    /// Serve a fresh entry, or run `fetcher` and cache what it returns.
    pub async fn fetch<T, E, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get_fresh(&key) {
            debug!(%key, "cache hit");
            return Ok(value);
        }

        let value = fetcher().await?;
        if let Err(e) = self.set(key.clone(), &value) {
            warn!(%key, "could not cache value: {}", e);
        }
        Ok(value)
    }
}
