use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::shared::{AggregateId, CacheError, OwnerProjection};
use crate::reactive::AsyncResult;

/// Keyed storage behind the owner cache.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectionStore: Send + Sync {
    fn get(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, CacheError>;

    fn put(&self, projection: OwnerProjection) -> AsyncResult<(), CacheError>;

    /// Removing an absent entry succeeds.
    fn remove(&self, id: AggregateId) -> AsyncResult<(), CacheError>;
}

#[derive(Default, Clone)]
pub struct InMemoryProjectionStore {
    entries: Arc<RwLock<HashMap<AggregateId, OwnerProjection>>>,
}

impl InMemoryProjectionStore {
    pub async fn contains(&self, id: AggregateId) -> bool {
        self.entries.read().await.contains_key(&id)
    }
}

impl ProjectionStore for InMemoryProjectionStore {
    fn get(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, CacheError> {
        let entries = self.entries.clone();
        AsyncResult::new(async move { Ok(entries.read().await.get(&id).cloned()) })
    }

    fn put(&self, projection: OwnerProjection) -> AsyncResult<(), CacheError> {
        let entries = self.entries.clone();
        AsyncResult::new(async move {
            entries.write().await.insert(projection.id, projection);
            Ok(())
        })
    }

    fn remove(&self, id: AggregateId) -> AsyncResult<(), CacheError> {
        let entries = self.entries.clone();
        AsyncResult::new(async move {
            entries.write().await.remove(&id);
            Ok(())
        })
    }
}
