//! In-memory cache of list views keyed by [`QueryKey`].
//!
//! Reads go through [`QueryCache::fetch`], which registers a
//! [`CancellationToken`] for the key. A load whose token was cancelled, or
//! that was superseded by a newer load of the same key, never writes its
//! result. Optimistic writers rely on this: they cancel every in-flight read
//! of a collection before patching it, so a stale response cannot overwrite
//! the patch.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use hireline_http::ApiError;

use crate::error::{CacheError, Result};
use crate::key::QueryKey;

/// An item that can be located by id inside a cached view.
pub trait CacheEntry: Clone + Send + Sync + 'static {
    /// Id of the entry, unique within its collection.
    fn entry_id(&self) -> &str;
}

/// One cached list view.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedView<T> {
    /// Items in server order.
    pub items: Vec<T>,
    /// When the view was written.
    pub fetched_at: DateTime<Utc>,
}

/// Every cached view of one collection, captured for rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot<T> {
    collection: String,
    views: HashMap<QueryKey, CachedView<T>>,
}

impl<T> CollectionSnapshot<T> {
    /// The snapshotted collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of views captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns `true` if the collection had no cached views.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

struct Inner<T> {
    views: HashMap<QueryKey, CachedView<T>>,
    in_flight: HashMap<QueryKey, InFlight>,
    next_generation: u64,
}

/// Cache of list views.
pub struct QueryCache<T> {
    inner: RwLock<Inner<T>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                views: HashMap::new(),
                in_flight: HashMap::new(),
                next_generation: 0,
            }),
        }
    }
}

impl<T> std::fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("QueryCache")
            .field("views", &inner.views.len())
            .field("in_flight", &inner.in_flight.len())
            .finish()
    }
}

impl<T> QueryCache<T>
where
    T: CacheEntry,
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached items for a key.
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<Vec<T>> {
        self.inner.read().views.get(key).map(|view| view.items.clone())
    }

    /// Get the cached view for a key, including its timestamp.
    #[must_use]
    pub fn view(&self, key: &QueryKey) -> Option<CachedView<T>> {
        self.inner.read().views.get(key).cloned()
    }

    /// Write a view directly, replacing whatever was cached for the key.
    pub fn set(&self, key: QueryKey, items: Vec<T>) {
        self.inner.write().views.insert(
            key,
            CachedView {
                items,
                fetched_at: Utc::now(),
            },
        );
    }

    /// Keys currently cached for a collection.
    #[must_use]
    pub fn keys(&self, collection: &str) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .inner
            .read()
            .views
            .keys()
            .filter(|key| key.belongs_to(collection))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Load a view and cache it.
    ///
    /// A newer `fetch` of the same key supersedes this one, and
    /// [`cancel_queries`](Self::cancel_queries) cancels it; either way the
    /// result is discarded and [`CacheError::Cancelled`] is returned.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, or `Cancelled` as described above.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, loader: F) -> Result<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<T>, ApiError>>,
    {
        let (generation, token) = self.register(&key);

        let loaded = tokio::select! {
            () = token.cancelled() => None,
            result = loader() => Some(result),
        };

        let mut inner = self.inner.write();
        let current = inner
            .in_flight
            .get(&key)
            .is_some_and(|flight| flight.generation == generation);
        if current {
            inner.in_flight.remove(&key);
        }

        let Some(result) = loaded else {
            tracing::debug!(key = %key, "Query cancelled");
            return Err(CacheError::Cancelled(key));
        };
        let items = result?;

        if !current || token.is_cancelled() {
            tracing::debug!(key = %key, "Discarding superseded query result");
            return Err(CacheError::Cancelled(key));
        }

        inner.views.insert(
            key,
            CachedView {
                items: items.clone(),
                fetched_at: Utc::now(),
            },
        );
        Ok(items)
    }

    fn register(&self, key: &QueryKey) -> (u64, CancellationToken) {
        let mut inner = self.inner.write();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let token = CancellationToken::new();
        let previous = inner.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        (generation, token)
    }

    /// Cancel every in-flight load of a collection.
    ///
    /// Returns the number of loads cancelled.
    pub fn cancel_queries(&self, collection: &str) -> usize {
        let mut inner = self.inner.write();
        let mut cancelled = 0;
        inner.in_flight.retain(|key, flight| {
            if key.belongs_to(collection) {
                flight.token.cancel();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        if cancelled > 0 {
            tracing::debug!(collection, cancelled, "Cancelled in-flight queries");
        }
        cancelled
    }

    /// Capture every cached view of a collection.
    #[must_use]
    pub fn snapshot(&self, collection: &str) -> CollectionSnapshot<T> {
        let views = self
            .inner
            .read()
            .views
            .iter()
            .filter(|(key, _)| key.belongs_to(collection))
            .map(|(key, view)| (key.clone(), view.clone()))
            .collect();
        CollectionSnapshot {
            collection: collection.to_string(),
            views,
        }
    }

    /// Put a collection back exactly as it was snapshotted.
    ///
    /// Views cached for the collection since the snapshot are dropped.
    pub fn restore(&self, snapshot: CollectionSnapshot<T>) {
        let mut inner = self.inner.write();
        inner
            .views
            .retain(|key, _| !key.belongs_to(&snapshot.collection));
        inner.views.extend(snapshot.views);
    }

    /// Apply `patch` to the entry with `id` in every view of a collection.
    ///
    /// Item order is left untouched. Returns the number of entries patched.
    pub fn update_entry<F>(&self, collection: &str, id: &str, mut patch: F) -> usize
    where
        F: FnMut(&mut T),
    {
        let mut inner = self.inner.write();
        let mut patched = 0;
        for (_, view) in inner
            .views
            .iter_mut()
            .filter(|(key, _)| key.belongs_to(collection))
        {
            for item in view.items.iter_mut().filter(|item| item.entry_id() == id) {
                patch(item);
                patched += 1;
            }
        }
        patched
    }

    /// Drop every view of a collection and cancel its in-flight loads.
    pub fn invalidate(&self, collection: &str) {
        self.cancel_queries(collection);
        self.inner
            .write()
            .views
            .retain(|key, _| !key.belongs_to(collection));
        tracing::debug!(collection, "Invalidated collection");
    }

    /// Number of cached views across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().views.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use hireline_http::ErrorKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        locked: bool,
    }

    impl CacheEntry for Row {
        fn entry_id(&self) -> &str {
            &self.id
        }
    }

    fn row(id: &str, locked: bool) -> Row {
        Row {
            id: id.to_string(),
            locked,
        }
    }

    fn page(n: u32) -> QueryKey {
        QueryKey::new("rows").param("page", n)
    }

    #[test]
    fn set_and_get() {
        let cache = QueryCache::new();
        assert!(cache.get(&page(1)).is_none());

        cache.set(page(1), vec![row("a", false)]);
        assert_eq!(cache.get(&page(1)), Some(vec![row("a", false)]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn update_entry_patches_every_view() {
        let cache = QueryCache::new();
        cache.set(page(1), vec![row("a", false), row("b", false)]);
        cache.set(page(2), vec![row("c", false), row("a", false)]);
        cache.set(QueryKey::new("other"), vec![row("a", false)]);

        let patched = cache.update_entry("rows", "a", |r| r.locked = true);

        assert_eq!(patched, 2);
        assert_eq!(
            cache.get(&page(1)).unwrap(),
            vec![row("a", true), row("b", false)]
        );
        assert_eq!(
            cache.get(&page(2)).unwrap(),
            vec![row("c", false), row("a", true)]
        );
        assert_eq!(
            cache.get(&QueryKey::new("other")).unwrap(),
            vec![row("a", false)]
        );
    }

    #[test]
    fn restore_is_verbatim() {
        let cache = QueryCache::new();
        cache.set(page(1), vec![row("a", false)]);
        cache.set(page(2), vec![row("b", true)]);
        let before = cache.snapshot("rows");

        cache.update_entry("rows", "a", |r| r.locked = true);
        cache.set(page(3), vec![row("z", false)]);
        cache.restore(before.clone());

        assert_eq!(cache.snapshot("rows"), before);
        assert!(cache.get(&page(3)).is_none());
    }

    #[test]
    fn invalidate_drops_collection_only() {
        let cache = QueryCache::new();
        cache.set(page(1), vec![row("a", false)]);
        cache.set(QueryKey::new("other"), vec![row("a", false)]);

        cache.invalidate("rows");

        assert!(cache.keys("rows").is_empty());
        assert_eq!(cache.keys("other").len(), 1);
    }

    #[tokio::test]
    async fn fetch_writes_result() {
        let cache = QueryCache::new();
        let items = cache
            .fetch(page(1), || async { Ok(vec![row("a", false)]) })
            .await
            .unwrap();

        assert_eq!(items, vec![row("a", false)]);
        assert_eq!(cache.get(&page(1)), Some(items));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_alone() {
        let cache = QueryCache::new();
        cache.set(page(1), vec![row("a", false)]);

        let err = cache
            .fetch(page(1), || async {
                Err(ApiError::new(ErrorKind::ServerError, "boom"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Api(ref e) if e.kind == ErrorKind::ServerError));
        assert_eq!(cache.get(&page(1)), Some(vec![row("a", false)]));
    }

    #[tokio::test]
    async fn cancelled_fetch_never_writes() {
        let cache = Arc::new(QueryCache::new());
        cache.set(page(1), vec![row("a", false)]);

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .fetch(page(1), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(vec![row("a", false)])
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.cancel_queries("rows"), 1);
        cache.update_entry("rows", "a", |r| r.locked = true);

        let err = slow.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(cache.get(&page(1)), Some(vec![row("a", true)]));
    }

    #[tokio::test]
    async fn superseded_fetch_never_writes() {
        let cache = Arc::new(QueryCache::new());

        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .fetch(page(1), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(vec![row("old", false)])
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let fresh = cache
            .fetch(page(1), || async { Ok(vec![row("new", false)]) })
            .await
            .unwrap();

        assert!(first.await.unwrap().unwrap_err().is_cancelled());
        assert_eq!(cache.get(&page(1)), Some(fresh));
    }
}
