use crate::domain::shared::{AggregateId, PageRequest, RepositoryError};
use crate::reactive::{AsyncCollection, AsyncResult};

use super::aggregate::Pet;

/// Persistence port for pets.
#[cfg_attr(test, mockall::automock)]
pub trait PetRepository: Send + Sync {
    fn create(&self, pet: Pet) -> AsyncResult<Pet, RepositoryError>;

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Pet>, RepositoryError>;

    fn update(&self, pet: Pet) -> AsyncResult<Pet, RepositoryError>;

    /// `false` when there was nothing to remove.
    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError>;

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Pet, RepositoryError>;

    fn count_all(&self) -> AsyncResult<u64, RepositoryError>;

    fn find_by_owner(&self, owner_id: AggregateId) -> AsyncCollection<Pet, RepositoryError>;
}
