// ============================================================================
// Owner-Resolution Cache
// ============================================================================
//
// Read-through cache of remote identity projections, held by the pet and vet
// services. Entries have no TTL: they leave the cache only when a DELETE for
// the identity is consumed.
//
// ============================================================================

mod owner_resolution;
mod redis_store;
mod store;

pub use owner_resolution::OwnerResolutionCache;
pub use redis_store::RedisProjectionStore;
pub use store::{InMemoryProjectionStore, ProjectionStore};

#[cfg(test)]
pub use store::MockProjectionStore;
