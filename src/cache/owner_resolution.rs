use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::Mutex;

use crate::domain::shared::{AggregateId, DomainError, DomainResult, OwnerLookup, OwnerProjection};
use crate::metrics::Metrics;
use crate::reactive::AsyncResult;

use super::store::ProjectionStore;

const OWNER: &str = "owner";

// ============================================================================
// Read-through owner cache
// ============================================================================
//
// get(id):
//   hit              -> cached projection, no remote call
//   miss + found     -> remote projection, stored before returning
//   miss + not found -> None, nothing stored (no negative caching)
//   miss + error     -> ReferenceResolutionFailed, nothing stored
//
// invalidate(id) bumps the id's epoch and removes the entry. A lookup only
// stores its result if the epoch it saw before calling out is still current,
// so a lookup racing a DELETE cannot bring the projection back.
//
// Epochs are tracked only while a lookup or invalidation for the id is in
// flight; the slot is dropped when the last holder leaves. Store writes for
// one id are serialized by that id's own lock, never a cache-wide one.
//
// Two concurrent misses for one id may both call the remote service; both
// write the same value.
//
// ============================================================================

#[derive(Default)]
struct KeySlot {
    holders: usize,
    epoch: u64,
    write: Arc<Mutex<()>>,
}

type Slots = Arc<StdMutex<HashMap<AggregateId, KeySlot>>>;

fn lock_slots(slots: &Slots) -> MutexGuard<'_, HashMap<AggregateId, KeySlot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Membership in an id's slot. Leaving happens on drop, so a cancelled
/// lookup still releases its slot.
struct SlotHold {
    slots: Slots,
    id: AggregateId,
    observed_epoch: u64,
    write: Arc<Mutex<()>>,
}

impl SlotHold {
    fn enter(slots: &Slots, id: AggregateId) -> Self {
        let mut map = lock_slots(slots);
        let slot = map.entry(id).or_default();
        slot.holders += 1;

        Self {
            slots: slots.clone(),
            id,
            observed_epoch: slot.epoch,
            write: slot.write.clone(),
        }
    }

    fn is_current(&self) -> bool {
        lock_slots(&self.slots)
            .get(&self.id)
            .is_some_and(|slot| slot.epoch == self.observed_epoch)
    }

    fn bump(&self) {
        if let Some(slot) = lock_slots(&self.slots).get_mut(&self.id) {
            slot.epoch += 1;
        }
    }
}

impl Drop for SlotHold {
    fn drop(&mut self) {
        let mut map = lock_slots(&self.slots);
        let released = match map.get_mut(&self.id) {
            Some(slot) => {
                slot.holders -= 1;
                slot.holders == 0
            }
            None => false,
        };
        if released {
            map.remove(&self.id);
        }
    }
}

#[derive(Clone)]
pub struct OwnerResolutionCache {
    store: Arc<dyn ProjectionStore>,
    lookup: Arc<dyn OwnerLookup>,
    slots: Slots,
    metrics: Option<Arc<Metrics>>,
}

impl OwnerResolutionCache {
    pub fn new(store: Arc<dyn ProjectionStore>, lookup: Arc<dyn OwnerLookup>) -> Self {
        Self {
            store,
            lookup,
            slots: Arc::new(StdMutex::new(HashMap::new())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn get(&self, id: AggregateId) -> DomainResult<Option<OwnerProjection>> {
        let cache = self.clone();

        AsyncResult::new(async move {
            match cache.store.get(id).await {
                Ok(Some(projection)) => {
                    cache.record("hit");
                    tracing::trace!(owner_id = %id, "Owner cache hit");
                    return Ok(Some(projection));
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(owner_id = %id, error = %error, "Owner cache read failed, treating as miss");
                }
            }

            let hold = SlotHold::enter(&cache.slots, id);

            let resolved = cache.lookup.lookup(id).await.map_err(|error| {
                cache.record("error");
                tracing::warn!(owner_id = %id, error = %error, "Owner lookup failed");
                error.into_domain(OWNER, id)
            })?;

            let Some(projection) = resolved else {
                cache.record("not_found");
                tracing::debug!(owner_id = %id, "Owner does not exist remotely");
                return Ok(None);
            };

            cache.record("miss");
            cache.populate(&hold, projection.clone()).await;
            Ok::<_, DomainError>(Some(projection))
        })
    }

    /// Remove the projection for `id`. Only the DELETE branch of the
    /// choreography handler calls this.
    pub fn invalidate(&self, id: AggregateId) -> DomainResult<()> {
        let cache = self.clone();

        AsyncResult::new(async move {
            let hold = SlotHold::enter(&cache.slots, id);
            let _write = hold.write.lock().await;
            hold.bump();

            cache.store.remove(id).await.map_err(|error| {
                tracing::error!(owner_id = %id, error = %error, "Owner cache invalidation failed");
                DomainError::unexpected(format!("owner cache invalidation failed: {error}"))
            })?;

            if let Some(metrics) = &cache.metrics {
                metrics.record_cache_invalidation();
            }
            tracing::info!(owner_id = %id, "🧹 Owner projection invalidated");
            Ok::<_, DomainError>(())
        })
    }

    async fn populate(&self, hold: &SlotHold, projection: OwnerProjection) {
        let id = hold.id;
        if projection.id != id {
            tracing::warn!(owner_id = %id, returned_id = %projection.id, "Owner lookup returned another id, not caching");
            return;
        }

        let _write = hold.write.lock().await;
        if !hold.is_current() {
            tracing::debug!(owner_id = %id, "Owner invalidated during lookup, not caching");
            return;
        }

        if let Err(error) = self.store.put(projection).await {
            tracing::warn!(owner_id = %id, error = %error, "Owner cache write failed");
        }
    }

    #[cfg(test)]
    fn tracked_ids(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    fn record(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryProjectionStore, MockProjectionStore};
    use crate::domain::shared::{CacheError, LookupError, MockOwnerLookup};
    use std::future::IntoFuture;
    use tokio::sync::Notify;

    fn ada(id: AggregateId) -> OwnerProjection {
        OwnerProjection::new(id, "Ada", "Lovelace")
    }

    fn cache_with(lookup: MockOwnerLookup) -> (OwnerResolutionCache, InMemoryProjectionStore) {
        let store = InMemoryProjectionStore::default();
        let cache = OwnerResolutionCache::new(Arc::new(store.clone()), Arc::new(lookup));
        (cache, store)
    }

    #[tokio::test]
    async fn test_miss_populates_then_hit_skips_remote() {
        let id = AggregateId::new();
        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .times(1)
            .returning(|id| AsyncResult::succeeded(Some(ada(id))));
        let (cache, store) = cache_with(lookup);

        assert_eq!(cache.get(id).await.unwrap(), Some(ada(id)));
        assert!(store.contains(id).await);
        assert_eq!(cache.get(id).await.unwrap(), Some(ada(id)));
    }

    #[tokio::test]
    async fn test_not_found_is_never_cached() {
        let id = AggregateId::new();
        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().times(2).returning(|_| AsyncResult::succeeded(None));
        let (cache, store) = cache_with(lookup);

        assert_eq!(cache.get(id).await.unwrap(), None);
        assert_eq!(cache.get(id).await.unwrap(), None);
        assert!(!store.contains(id).await);
    }

    #[tokio::test]
    async fn test_lookup_error_surfaces_as_resolution_failure() {
        let id = AggregateId::new();
        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .returning(|_| AsyncResult::error(LookupError::Protocol { status: 503 }));
        let (cache, store) = cache_with(lookup);

        let result = cache.get(id).await;
        assert!(matches!(result, Err(DomainError::ReferenceResolutionFailed { .. })));
        assert!(!store.contains(id).await);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_lookup() {
        let id = AggregateId::new();
        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .times(2)
            .returning(|id| AsyncResult::succeeded(Some(ada(id))));
        let (cache, store) = cache_with(lookup);

        for _ in 0..3 {
            cache.get(id).await.unwrap();
        }
        cache.invalidate(id).await.unwrap();
        assert!(!store.contains(id).await);

        cache.get(id).await.unwrap();
    }

    struct GatedLookup {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl OwnerLookup for GatedLookup {
        fn lookup(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, LookupError> {
            let started = self.started.clone();
            let release = self.release.clone();
            AsyncResult::new(async move {
                started.notify_one();
                release.notified().await;
                Ok(Some(ada(id)))
            })
        }
    }

    #[tokio::test]
    async fn test_lookup_racing_invalidation_does_not_repopulate() {
        let id = AggregateId::new();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let store = InMemoryProjectionStore::default();
        let cache = OwnerResolutionCache::new(
            Arc::new(store.clone()),
            Arc::new(GatedLookup {
                started: started.clone(),
                release: release.clone(),
            }),
        );

        let pending = tokio::spawn(cache.get(id).into_future());
        started.notified().await;

        cache.invalidate(id).await.unwrap();
        release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), Some(ada(id)));
        assert!(!store.contains(id).await);
    }

    #[tokio::test]
    async fn test_invalidations_leave_no_tracked_ids_behind() {
        let (cache, _store) = cache_with(MockOwnerLookup::new());

        for _ in 0..10_000 {
            cache.invalidate(AggregateId::new()).await.unwrap();
        }

        assert_eq!(cache.tracked_ids(), 0);
    }

    #[tokio::test]
    async fn test_finished_lookups_release_their_slot() {
        let found = AggregateId::new();
        let missing = AggregateId::new();
        let failing = AggregateId::new();
        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().returning(move |id| {
            if id == found {
                AsyncResult::succeeded(Some(ada(id)))
            } else if id == missing {
                AsyncResult::succeeded(None)
            } else {
                AsyncResult::error(LookupError::Protocol { status: 500 })
            }
        });
        let (cache, _store) = cache_with(lookup);

        cache.get(found).await.unwrap();
        cache.get(missing).await.unwrap();
        assert!(cache.get(failing).await.is_err());

        assert_eq!(cache.tracked_ids(), 0);
    }

    #[tokio::test]
    async fn test_slow_write_for_one_id_does_not_block_another() {
        let slow = AggregateId::new();
        let other = AggregateId::new();
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut store = MockProjectionStore::new();
        store.expect_get().returning(|_| AsyncResult::succeeded(None));
        let (entered_put, release_put) = (entered.clone(), release.clone());
        store.expect_put().returning(move |_| {
            let (entered, release) = (entered_put.clone(), release_put.clone());
            AsyncResult::new(async move {
                entered.notify_one();
                release.notified().await;
                Ok(())
            })
        });
        store.expect_remove().returning(|_| AsyncResult::succeeded(()));

        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().returning(|id| AsyncResult::succeeded(Some(ada(id))));
        let cache = OwnerResolutionCache::new(Arc::new(store), Arc::new(lookup));

        let pending = tokio::spawn(cache.get(slow).into_future());
        entered.notified().await;

        let invalidated =
            tokio::time::timeout(std::time::Duration::from_secs(1), cache.invalidate(other).into_future()).await;
        assert!(matches!(invalidated, Ok(Ok(()))));

        release.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), Some(ada(slow)));
    }

    #[tokio::test]
    async fn test_mismatched_lookup_id_is_not_cached() {
        let id = AggregateId::new();
        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .returning(|_| AsyncResult::succeeded(Some(ada(AggregateId::new()))));
        let (cache, store) = cache_with(lookup);

        cache.get(id).await.unwrap();
        assert!(!store.contains(id).await);
    }

    #[tokio::test]
    async fn test_store_read_failure_falls_back_to_lookup() {
        let id = AggregateId::new();
        let mut store = MockProjectionStore::new();
        store.expect_get().returning(|_| {
            AsyncResult::error(CacheError::Unavailable {
                message: "connection refused".to_string(),
            })
        });
        store.expect_put().times(1).returning(|_| AsyncResult::succeeded(()));

        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .times(1)
            .returning(|id| AsyncResult::succeeded(Some(ada(id))));

        let cache = OwnerResolutionCache::new(Arc::new(store), Arc::new(lookup));
        assert_eq!(cache.get(id).await.unwrap(), Some(ada(id)));
    }

    #[tokio::test]
    async fn test_store_remove_failure_propagates() {
        let mut store = MockProjectionStore::new();
        store.expect_remove().returning(|_| {
            AsyncResult::error(CacheError::Unavailable {
                message: "timeout".to_string(),
            })
        });

        let cache = OwnerResolutionCache::new(Arc::new(store), Arc::new(MockOwnerLookup::new()));
        let result = cache.invalidate(AggregateId::new()).await;
        assert!(matches!(result, Err(DomainError::UnexpectedFailure { .. })));
    }
}
