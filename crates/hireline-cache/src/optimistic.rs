//! Optimistic toggle mutations with rollback.
//!
//! A toggle is applied to every cached view of its collection before the
//! server has confirmed it:
//!
//! 1. cancel in-flight reads of the collection
//! 2. snapshot every view
//! 3. patch the target entry in place
//! 4. call the endpoint for the desired state
//!
//! On failure the snapshot is restored verbatim and the error is returned.
//! On success nothing further is written; later reads reconcile.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use hireline_http::ApiError;

use crate::cache::{CacheEntry, QueryCache};
use crate::error::MutationError;

/// A server-side state change with a matching local patch.
#[async_trait]
pub trait StateMutation: Send + Sync {
    /// Cached entry type the mutation patches.
    type Entry: CacheEntry;
    /// Desired state selected by the caller.
    type State: fmt::Debug + Send + Sync;

    /// Collection whose views are patched.
    fn collection(&self) -> &str;

    /// Short description of the change, for logs and errors.
    fn describe(&self, state: &Self::State) -> String;

    /// Patch only the toggled field of an entry.
    fn patch(&self, entry: &mut Self::Entry, state: &Self::State);

    /// Ask the server to move `target_id` into `state`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure if the server rejects the change or the
    /// call fails.
    async fn commit(&self, target_id: &str, state: &Self::State) -> Result<(), ApiError>;
}

/// Applies a [`StateMutation`] optimistically against a [`QueryCache`].
pub struct OptimisticCoordinator<M>
where
    M: StateMutation,
{
    cache: Arc<QueryCache<M::Entry>>,
    mutation: M,
}

impl<M> OptimisticCoordinator<M>
where
    M: StateMutation,
{
    /// Create a coordinator.
    #[must_use]
    pub const fn new(cache: Arc<QueryCache<M::Entry>>, mutation: M) -> Self {
        Self { cache, mutation }
    }

    /// The mutation this coordinator applies.
    #[must_use]
    pub const fn mutation(&self) -> &M {
        &self.mutation
    }

    /// Apply `state` to `target_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`MutationError`] if the server call fails. Every cached view
    /// of the collection has been rolled back by then.
    pub async fn apply(&self, target_id: &str, state: M::State) -> Result<(), MutationError> {
        let collection = self.mutation.collection();
        let action = self.mutation.describe(&state);

        self.cache.cancel_queries(collection);
        let snapshot = self.cache.snapshot(collection);
        let patched = self
            .cache
            .update_entry(collection, target_id, |entry| self.mutation.patch(entry, &state));
        tracing::debug!(collection, target_id, action = %action, patched, "Applied optimistic patch");

        match self.mutation.commit(target_id, &state).await {
            Ok(()) => {
                tracing::debug!(collection, target_id, action = %action, "Mutation confirmed");
                Ok(())
            }
            Err(err) => {
                self.cache.restore(snapshot);
                tracing::warn!(
                    collection,
                    target_id,
                    action = %action,
                    kind = %err.kind,
                    error = %err,
                    "Mutation failed, rolled back"
                );
                Err(MutationError {
                    collection: collection.to_string(),
                    target_id: target_id.to_string(),
                    action,
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hireline_http::ErrorKind;
    use parking_lot::Mutex;

    use crate::key::QueryKey;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        name: String,
        locked: bool,
    }

    impl CacheEntry for Row {
        fn entry_id(&self) -> &str {
            &self.id
        }
    }

    struct LockToggle {
        fail_with: Option<ErrorKind>,
        calls: Mutex<Vec<(String, bool)>>,
        delay: Duration,
    }

    impl LockToggle {
        fn ok() -> Self {
            Self {
                fail_with: None,
                calls: Mutex::default(),
                delay: Duration::ZERO,
            }
        }

        fn failing(kind: ErrorKind) -> Self {
            Self {
                fail_with: Some(kind),
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl StateMutation for LockToggle {
        type Entry = Row;
        type State = bool;

        fn collection(&self) -> &str {
            "rows"
        }

        fn describe(&self, locked: &bool) -> String {
            String::from(if *locked { "lock" } else { "unlock" })
        }

        fn patch(&self, entry: &mut Row, locked: &bool) {
            entry.locked = *locked;
        }

        async fn commit(&self, target_id: &str, locked: &bool) -> Result<(), ApiError> {
            self.calls.lock().push((target_id.to_string(), *locked));
            tokio::time::sleep(self.delay).await;
            match self.fail_with {
                Some(kind) => Err(ApiError::new(kind, "rejected")),
                None => Ok(()),
            }
        }
    }

    fn row(id: &str, locked: bool) -> Row {
        Row {
            id: id.to_string(),
            name: format!("user {id}"),
            locked,
        }
    }

    fn seeded() -> Arc<QueryCache<Row>> {
        let cache = Arc::new(QueryCache::new());
        cache.set(
            QueryKey::new("rows").param("page", 1),
            vec![row("1", false), row("2", false)],
        );
        cache.set(
            QueryKey::new("rows").param("page", 2),
            vec![row("3", true), row("2", false)],
        );
        cache.set(
            QueryKey::new("rows").param("q", "user 2"),
            vec![row("2", false)],
        );
        cache
    }

    #[tokio::test]
    async fn success_keeps_patch_in_every_view() {
        let cache = seeded();
        let coordinator = OptimisticCoordinator::new(Arc::clone(&cache), LockToggle::ok());

        coordinator.apply("2", true).await.unwrap();

        for key in cache.keys("rows") {
            let items = cache.get(&key).unwrap();
            for item in items.iter().filter(|r| r.id == "2") {
                assert!(item.locked, "{key} not patched");
            }
        }
        assert_eq!(
            cache.get(&QueryKey::new("rows").param("page", 1)).unwrap(),
            vec![row("1", false), row("2", true)]
        );
        assert_eq!(*coordinator.mutation().calls.lock(), vec![("2".to_string(), true)]);
    }

    #[tokio::test]
    async fn failure_restores_every_view_exactly() {
        for kind in [ErrorKind::Forbidden, ErrorKind::NetworkError, ErrorKind::ServerError] {
            let cache = seeded();
            let before = cache.snapshot("rows");
            let coordinator =
                OptimisticCoordinator::new(Arc::clone(&cache), LockToggle::failing(kind));

            let err = coordinator.apply("2", true).await.unwrap_err();

            assert_eq!(err.kind(), kind);
            assert_eq!(err.action, "lock");
            assert_eq!(cache.snapshot("rows"), before);
        }
    }

    #[tokio::test]
    async fn patch_is_visible_while_the_call_is_pending() {
        let cache = seeded();
        let mut toggle = LockToggle::failing(ErrorKind::Conflict);
        toggle.delay = Duration::from_millis(50);
        let coordinator = Arc::new(OptimisticCoordinator::new(Arc::clone(&cache), toggle));

        let pending = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.apply("1", true).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let page = cache.get(&QueryKey::new("rows").param("page", 1)).unwrap();
        assert!(page[0].locked);

        assert!(pending.await.unwrap().is_err());
        let page = cache.get(&QueryKey::new("rows").param("page", 1)).unwrap();
        assert!(!page[0].locked);
    }

    #[tokio::test]
    async fn in_flight_read_cannot_overwrite_patch() {
        let cache = seeded();
        let key = QueryKey::new("rows").param("page", 1);

        let stale = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .fetch(key, || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(vec![row("1", false), row("2", false)])
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let coordinator = OptimisticCoordinator::new(Arc::clone(&cache), LockToggle::ok());
        coordinator.apply("1", true).await.unwrap();

        assert!(stale.await.unwrap().unwrap_err().is_cancelled());
        assert!(cache.get(&key).unwrap()[0].locked);
    }

    #[tokio::test]
    async fn unknown_target_still_calls_server() {
        let cache = seeded();
        let before = cache.snapshot("rows");
        let coordinator = OptimisticCoordinator::new(Arc::clone(&cache), LockToggle::ok());

        coordinator.apply("99", true).await.unwrap();

        assert_eq!(cache.snapshot("rows"), before);
        assert_eq!(coordinator.mutation().calls.lock().len(), 1);
    }
}
