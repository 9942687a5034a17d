use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::identity::{Identity, IdentityRepository};
use crate::domain::pet::{Pet, PetRepository};
use crate::domain::shared::{AggregateId, PageRequest, RepositoryError};
use crate::domain::vet::{Vet, VetRepository};
use crate::messaging::{DeadLetter, DeadLetterStore};
use crate::reactive::{AsyncCollection, AsyncResult};

// ============================================================================
// In-memory tables
// ============================================================================
//
// Rows keep insertion order, which is also the paging order.
//
// ============================================================================

trait Keyed: Clone + Send + Sync + 'static {
    fn key(&self) -> AggregateId;
}

impl Keyed for Identity {
    fn key(&self) -> AggregateId {
        self.id
    }
}

impl Keyed for Pet {
    fn key(&self) -> AggregateId {
        self.id
    }
}

impl Keyed for Vet {
    fn key(&self) -> AggregateId {
        self.id
    }
}

struct Table<T> {
    name: &'static str,
    rows: Arc<RwLock<Vec<T>>>,
}

impl<T> Table<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T: Keyed> Table<T> {
    fn insert(&self, row: T) -> AsyncResult<T, RepositoryError> {
        self.insert_unless(row, |_, _| None)
    }

    /// Insert `row` unless its key is taken or `clash` names a conflict with
    /// a stored row. The check and the push happen under one write lock.
    fn insert_unless<F>(&self, row: T, clash: F) -> AsyncResult<T, RepositoryError>
    where
        F: Fn(&T, &T) -> Option<String> + Send + 'static,
    {
        let rows = self.rows.clone();
        let name = self.name;
        AsyncResult::new(async move {
            let mut rows = rows.write().await;
            for existing in rows.iter() {
                if existing.key() == row.key() {
                    return Err(RepositoryError::Conflict {
                        message: format!("{name} {} already exists", row.key()),
                    });
                }
                if let Some(message) = clash(existing, &row) {
                    return Err(RepositoryError::Conflict { message });
                }
            }
            rows.push(row.clone());
            Ok(row)
        })
    }

    fn get(&self, id: AggregateId) -> AsyncResult<Option<T>, RepositoryError> {
        let rows = self.rows.clone();
        AsyncResult::new(async move { Ok(rows.read().await.iter().find(|row| row.key() == id).cloned()) })
    }

    fn replace(&self, row: T) -> AsyncResult<T, RepositoryError> {
        let rows = self.rows.clone();
        let name = self.name;
        AsyncResult::new(async move {
            let mut rows = rows.write().await;
            match rows.iter_mut().find(|existing| existing.key() == row.key()) {
                Some(existing) => {
                    *existing = row.clone();
                    Ok(row)
                }
                None => Err(RepositoryError::Conflict {
                    message: format!("{name} {} no longer exists", row.key()),
                }),
            }
        })
    }

    fn remove(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        let rows = self.rows.clone();
        AsyncResult::new(async move {
            let mut rows = rows.write().await;
            let before = rows.len();
            rows.retain(|row| row.key() != id);
            Ok(rows.len() != before)
        })
    }

    fn page(&self, page: PageRequest) -> AsyncCollection<T, RepositoryError> {
        let rows = self.rows.clone();
        AsyncCollection::from_batch(AsyncResult::new(async move {
            let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
            let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
            Ok(rows.read().await.iter().skip(offset).take(limit).cloned().collect())
        }))
    }

    fn count(&self) -> AsyncResult<u64, RepositoryError> {
        let rows = self.rows.clone();
        AsyncResult::new(async move { Ok(rows.read().await.len() as u64) })
    }

    fn filter<F>(&self, predicate: F) -> AsyncCollection<T, RepositoryError>
    where
        F: Fn(&T) -> bool + Send + 'static,
    {
        let rows = self.rows.clone();
        AsyncCollection::from_batch(AsyncResult::new(async move {
            Ok(rows.read().await.iter().filter(|row| predicate(row)).cloned().collect())
        }))
    }
}

// ============================================================================
// Repositories
// ============================================================================

pub struct InMemoryIdentityRepository {
    table: Table<Identity>,
}

impl Default for InMemoryIdentityRepository {
    fn default() -> Self {
        Self {
            table: Table::new("identity"),
        }
    }
}

impl IdentityRepository for InMemoryIdentityRepository {
    fn create(&self, identity: Identity) -> AsyncResult<Identity, RepositoryError> {
        self.table.insert(identity)
    }

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Identity>, RepositoryError> {
        self.table.get(id)
    }

    fn update(&self, identity: Identity) -> AsyncResult<Identity, RepositoryError> {
        self.table.replace(identity)
    }

    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        self.table.remove(id)
    }

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Identity, RepositoryError> {
        self.table.page(page)
    }

    fn count_all(&self) -> AsyncResult<u64, RepositoryError> {
        self.table.count()
    }
}

pub struct InMemoryPetRepository {
    table: Table<Pet>,
}

impl Default for InMemoryPetRepository {
    fn default() -> Self {
        Self {
            table: Table::new("pet"),
        }
    }
}

impl PetRepository for InMemoryPetRepository {
    fn create(&self, pet: Pet) -> AsyncResult<Pet, RepositoryError> {
        self.table.insert(pet)
    }

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Pet>, RepositoryError> {
        self.table.get(id)
    }

    fn update(&self, pet: Pet) -> AsyncResult<Pet, RepositoryError> {
        self.table.replace(pet)
    }

    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        self.table.remove(id)
    }

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Pet, RepositoryError> {
        self.table.page(page)
    }

    fn count_all(&self) -> AsyncResult<u64, RepositoryError> {
        self.table.count()
    }

    fn find_by_owner(&self, owner_id: AggregateId) -> AsyncCollection<Pet, RepositoryError> {
        self.table.filter(move |pet| pet.owner_id == Some(owner_id))
    }
}

pub struct InMemoryVetRepository {
    table: Table<Vet>,
}

impl Default for InMemoryVetRepository {
    fn default() -> Self {
        Self {
            table: Table::new("vet"),
        }
    }
}

impl VetRepository for InMemoryVetRepository {
    fn create(&self, vet: Vet) -> AsyncResult<Vet, RepositoryError> {
        self.table.insert_unless(vet, |existing, vet| {
            (existing.identity_id == vet.identity_id)
                .then(|| format!("identity {} already has vet {}", vet.identity_id, existing.id))
        })
    }

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Vet>, RepositoryError> {
        self.table.get(id)
    }

    fn update(&self, vet: Vet) -> AsyncResult<Vet, RepositoryError> {
        self.table.replace(vet)
    }

    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        self.table.remove(id)
    }

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Vet, RepositoryError> {
        self.table.page(page)
    }

    fn count_all(&self) -> AsyncResult<u64, RepositoryError> {
        self.table.count()
    }

    fn find_by_identity(&self, identity_id: AggregateId) -> AsyncCollection<Vet, RepositoryError> {
        self.table.filter(move |vet| vet.identity_id == identity_id)
    }
}

// ============================================================================
// Dead letters
// ============================================================================

#[derive(Default, Clone)]
pub struct InMemoryDeadLetterStore {
    letters: Arc<RwLock<Vec<DeadLetter>>>,
}

impl DeadLetterStore for InMemoryDeadLetterStore {
    fn park(&self, letter: DeadLetter) -> AsyncResult<(), RepositoryError> {
        let letters = self.letters.clone();
        AsyncResult::new(async move {
            letters.write().await.push(letter);
            Ok(())
        })
    }

    fn list(&self, limit: u32) -> AsyncResult<Vec<DeadLetter>, RepositoryError> {
        let letters = self.letters.clone();
        AsyncResult::new(async move {
            Ok(letters
                .read()
                .await
                .iter()
                .take(limit as usize)
                .cloned()
                .collect())
        })
    }

    fn remove(&self, id: Uuid) -> AsyncResult<bool, RepositoryError> {
        let letters = self.letters.clone();
        AsyncResult::new(async move {
            let mut letters = letters.write().await;
            let before = letters.len();
            letters.retain(|letter| letter.id != id);
            Ok(letters.len() != before)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pet(owner_id: Option<AggregateId>) -> Pet {
        let mut pet = Pet::create(AggregateId::new(), "Basil", "hamster", None).unwrap();
        pet.owner_id = owner_id;
        pet
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let repository = InMemoryPetRepository::default();
        let basil = pet(None);
        repository.create(basil.clone()).await.unwrap();

        let result = repository.create(basil).await;
        assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_second_vet_for_identity_is_conflict() {
        let repository = InMemoryVetRepository::default();
        let identity_id = AggregateId::new();
        let specialities = vec!["dentistry".to_string()];
        repository
            .create(Vet::create(AggregateId::new(), identity_id, &specialities).unwrap())
            .await
            .unwrap();

        let result = repository
            .create(Vet::create(AggregateId::new(), identity_id, &specialities).unwrap())
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
        assert_eq!(repository.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let repository = InMemoryPetRepository::default();
        let basil = pet(None);
        repository.create(basil.clone()).await.unwrap();

        assert!(repository.delete(basil.id).await.unwrap());
        assert!(!repository.delete(basil.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_conflict() {
        let repository = InMemoryPetRepository::default();
        let result = repository.update(pet(None)).await;
        assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_paging_follows_insertion_order() {
        let repository = InMemoryPetRepository::default();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let p = pet(None);
            ids.push(p.id);
            repository.create(p).await.unwrap();
        }

        let second_page: Vec<_> = repository
            .find_page(PageRequest::new(1, 2).unwrap())
            .map(|p| p.id)
            .collect()
            .await
            .unwrap();
        assert_eq!(second_page, ids[2..4].to_vec());
        assert_eq!(repository.count_all().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_find_by_owner_filters() {
        let repository = InMemoryPetRepository::default();
        let owner = AggregateId::new();
        repository.create(pet(Some(owner))).await.unwrap();
        repository.create(pet(Some(AggregateId::new()))).await.unwrap();
        repository.create(pet(None)).await.unwrap();

        let owned = repository.find_by_owner(owner).collect().await.unwrap();
        assert_eq!(owned.len(), 1);
    }
}
