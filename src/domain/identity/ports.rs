use crate::domain::shared::{AggregateId, PageRequest, RepositoryError};
use crate::reactive::{AsyncCollection, AsyncResult};

use super::aggregate::Identity;

/// Persistence port for identities.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityRepository: Send + Sync {
    fn create(&self, identity: Identity) -> AsyncResult<Identity, RepositoryError>;

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Identity>, RepositoryError>;

    fn update(&self, identity: Identity) -> AsyncResult<Identity, RepositoryError>;

    /// `false` when there was nothing to remove.
    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError>;

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Identity, RepositoryError>;

    fn count_all(&self) -> AsyncResult<u64, RepositoryError>;
}
