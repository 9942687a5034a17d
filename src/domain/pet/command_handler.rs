use std::sync::Arc;

use crate::cache::OwnerResolutionCache;
use crate::domain::shared::{
    announce_committed, AggregateId, CascadeOnRemoteDelete, CascadeReport, DomainError, DomainEvent, DomainResult,
    EventAction, EventPublishPort, OwnerProjection, Page, PageRequest,
};
use crate::reactive::AsyncResult;

use super::aggregate::{Pet, PetDetails};
use super::commands::{AdoptPet, CreatePet};
use super::events::PetSnapshot;
use super::ports::PetRepository;

const PET: &str = "pet";
const OWNER: &str = "owner";

// ============================================================================
// Pet Command Handler
// ============================================================================
//
// create / adopt   resolve owner -> write -> announce
// delete           load -> delete -> announce DELETE
// cascade          remove every pet of a deleted owner (choreography only)
// search           page -> resolve each distinct owner once -> zip back
//
// An owner that resolves to nothing fails with ReferenceNotFound before any
// write; an owner lookup that errors fails with ReferenceResolutionFailed,
// also before any write.
//
// ============================================================================

pub struct PetCommandHandler {
    repository: Arc<dyn PetRepository>,
    publisher: Arc<dyn EventPublishPort<PetSnapshot>>,
    owners: OwnerResolutionCache,
}

impl PetCommandHandler {
    pub fn new(
        repository: Arc<dyn PetRepository>,
        publisher: Arc<dyn EventPublishPort<PetSnapshot>>,
        owners: OwnerResolutionCache,
    ) -> Self {
        Self {
            repository,
            publisher,
            owners,
        }
    }

    pub fn create(&self, command: CreatePet) -> DomainResult<PetDetails> {
        let pet = match Pet::create(AggregateId::new(), &command.name, &command.species, command.birth_date) {
            Ok(pet) => pet,
            Err(e) => return AsyncResult::error(e.into()),
        };

        let owner = match command.owner_id {
            Some(owner_id) => resolve_owner(&self.owners, owner_id).map(Some),
            None => AsyncResult::succeeded(None),
        };

        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        owner
            .flat_map(move |owner: Option<OwnerProjection>| {
                let mut pet = pet;
                pet.owner_id = owner.as_ref().map(|o| o.id);
                repository
                    .create(pet)
                    .map_err(DomainError::from)
                    .map(move |pet| PetDetails { pet, owner })
            })
            .flat_map(move |details| {
                tracing::info!(pet_id = %details.pet.id, owner_id = ?details.pet.owner_id, "Pet created");
                let event = DomainEvent::with_snapshot(details.pet.id, details.pet.snapshot());
                announce_committed(publisher.as_ref(), event, EventAction::Create, details)
            })
    }

    pub fn adopt(&self, pet_id: AggregateId, command: AdoptPet) -> DomainResult<PetDetails> {
        let owners = self.owners.clone();
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();
        let owner_id = command.owner_id;

        self.load(pet_id)
            .flat_map(move |mut pet| {
                if let Err(e) = pet.adopt(owner_id) {
                    return AsyncResult::error(e.into());
                }

                resolve_owner(&owners, owner_id).flat_map(move |owner| {
                    repository
                        .update(pet)
                        .map_err(DomainError::from)
                        .map(move |pet| PetDetails {
                            pet,
                            owner: Some(owner),
                        })
                })
            })
            .flat_map(move |details| {
                tracing::info!(pet_id = %details.pet.id, owner_id = %owner_id, "Pet adopted");
                let event = DomainEvent::with_snapshot(details.pet.id, details.pet.snapshot());
                announce_committed(publisher.as_ref(), event, EventAction::Update, details)
            })
    }

    pub fn delete(&self, pet_id: AggregateId) -> DomainResult<()> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.load(pet_id)
            .flat_map(move |_| repository.delete(pet_id).map_err(DomainError::from))
            .flat_map(move |removed| {
                if !removed {
                    return AsyncResult::error(DomainError::conflict(format!("pet {pet_id} cannot be deleted")));
                }
                tracing::info!(pet_id = %pet_id, "🗑️ Pet deleted");
                announce_committed(publisher.as_ref(), DomainEvent::deleted(pet_id), EventAction::Delete, ())
            })
    }

    /// Remove every pet owned by `owner_id`, announcing each removal.
    ///
    /// Pets already gone are skipped, so running this again for the same
    /// owner reports zero removals.
    pub fn remove_owner_pets(&self, owner_id: AggregateId) -> DomainResult<CascadeReport> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.repository
            .find_by_owner(owner_id)
            .collect()
            .map_err(DomainError::from)
            .flat_map(move |pets| {
                AsyncResult::new(async move {
                    let mut report = CascadeReport::default();

                    for pet in pets {
                        if !repository.delete(pet.id).await? {
                            tracing::debug!(pet_id = %pet.id, "Pet already removed");
                            continue;
                        }
                        announce_committed(publisher.as_ref(), DomainEvent::deleted(pet.id), EventAction::Delete, ())
                            .await?;
                        report.removed += 1;
                    }

                    tracing::info!(
                        owner_id = %owner_id,
                        removed = report.removed,
                        "Pets of deleted owner removed"
                    );
                    Ok::<_, DomainError>(report)
                })
            })
    }

    pub fn search(&self, page: PageRequest) -> DomainResult<Page<PetDetails>> {
        let owners = self.owners.clone();

        let items = self
            .repository
            .find_page(page)
            .map_err(DomainError::from)
            .zip_resolved(|pet: &Pet| pet.owner_id, move |owner_id| owners.get(owner_id))
            .map(|(pet, owner)| PetDetails { pet, owner })
            .collect();

        self.repository
            .count_all()
            .map_err(DomainError::from)
            .zip(items)
            .map(move |(total, items)| Page::new(page, items, total))
    }

    fn load(&self, pet_id: AggregateId) -> DomainResult<Pet> {
        self.repository
            .load_by_id(pet_id)
            .map_err(DomainError::from)
            .or_error(move || DomainError::not_found(PET, pet_id))
    }
}

impl CascadeOnRemoteDelete for PetCommandHandler {
    fn on_remote_delete(&self, remote_id: AggregateId) -> DomainResult<CascadeReport> {
        self.remove_owner_pets(remote_id)
    }
}

fn resolve_owner(owners: &OwnerResolutionCache, owner_id: AggregateId) -> DomainResult<OwnerProjection> {
    owners
        .get(owner_id)
        .or_error(move || DomainError::ReferenceNotFound { kind: OWNER, id: owner_id })
}
