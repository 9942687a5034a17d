use crate::domain::shared::{AggregateId, PageRequest, RepositoryError};
use crate::reactive::{AsyncCollection, AsyncResult};

use super::aggregate::Vet;

/// Persistence port for vets.
#[cfg_attr(test, mockall::automock)]
pub trait VetRepository: Send + Sync {
    fn create(&self, vet: Vet) -> AsyncResult<Vet, RepositoryError>;

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Vet>, RepositoryError>;

    fn update(&self, vet: Vet) -> AsyncResult<Vet, RepositoryError>;

    /// `false` when there was nothing to remove.
    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError>;

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Vet, RepositoryError>;

    fn count_all(&self) -> AsyncResult<u64, RepositoryError>;

    fn find_by_identity(&self, identity_id: AggregateId) -> AsyncCollection<Vet, RepositoryError>;
}
