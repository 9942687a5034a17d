use std::sync::Arc;

use crate::domain::shared::{
    announce_committed, AggregateId, DomainError, DomainEvent, DomainResult, EventAction, EventPublishPort, Page,
    PageRequest,
};
use crate::reactive::AsyncResult;

use super::aggregate::Identity;
use super::commands::{AssignRole, CreateIdentity, UpdateIdentity};
use super::events::IdentitySnapshot;
use super::ports::IdentityRepository;

const IDENTITY: &str = "identity";

// ============================================================================
// Identity Command Handler
// ============================================================================
//
// Orchestrates: validate -> repository write -> announce on `identity`
//
// Every announcement happens after the write resolved; a write failure
// means nothing is published.
//
// ============================================================================

pub struct IdentityCommandHandler {
    repository: Arc<dyn IdentityRepository>,
    publisher: Arc<dyn EventPublishPort<IdentitySnapshot>>,
}

impl IdentityCommandHandler {
    pub fn new(
        repository: Arc<dyn IdentityRepository>,
        publisher: Arc<dyn EventPublishPort<IdentitySnapshot>>,
    ) -> Self {
        Self { repository, publisher }
    }

    pub fn create(&self, command: CreateIdentity) -> DomainResult<Identity> {
        let identity = match Identity::create(
            AggregateId::new(),
            &command.first_name,
            &command.last_name,
            &command.roles,
        ) {
            Ok(identity) => identity,
            Err(e) => return AsyncResult::error(e.into()),
        };

        let publisher = self.publisher.clone();

        self.repository
            .create(identity)
            .map_err(DomainError::from)
            .flat_map(move |created| {
                tracing::info!(identity_id = %created.id, "Identity created");
                let event = DomainEvent::with_snapshot(created.id, created.snapshot());
                announce_committed(publisher.as_ref(), event, EventAction::Create, created.with_sorted_roles())
            })
    }

    pub fn get(&self, id: AggregateId) -> DomainResult<Identity> {
        self.load(id).map(Identity::with_sorted_roles)
    }

    pub fn update(&self, id: AggregateId, command: UpdateIdentity) -> DomainResult<Identity> {
        let repository = self.repository.clone();

        let updated = self.load(id).flat_map(move |mut identity| {
            if let Err(e) = identity.rename(&command.first_name, &command.last_name) {
                return AsyncResult::error(e.into());
            }
            repository.update(identity).map_err(DomainError::from)
        });

        self.announce_update(updated)
    }

    pub fn assign_role(&self, id: AggregateId, command: AssignRole) -> DomainResult<Identity> {
        let repository = self.repository.clone();

        let updated = self.load(id).flat_map(move |mut identity| {
            if let Err(e) = identity.assign_role(&command.role) {
                return AsyncResult::error(e.into());
            }
            repository.update(identity).map_err(DomainError::from)
        });

        self.announce_update(updated)
    }

    pub fn delete(&self, id: AggregateId) -> DomainResult<()> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.load(id)
            .flat_map(move |_| repository.delete(id).map_err(DomainError::from))
            .flat_map(move |removed| {
                if !removed {
                    return AsyncResult::error(DomainError::conflict(format!(
                        "identity {id} cannot be deleted"
                    )));
                }
                tracing::info!(identity_id = %id, "🗑️ Identity deleted");
                announce_committed(publisher.as_ref(), DomainEvent::deleted(id), EventAction::Delete, ())
            })
    }

    pub fn list(&self, page: PageRequest) -> DomainResult<Page<Identity>> {
        let items = self
            .repository
            .find_page(page)
            .map(Identity::with_sorted_roles)
            .collect();

        self.repository
            .count_all()
            .zip(items)
            .map_err(DomainError::from)
            .map(move |(total, items)| Page::new(page, items, total))
    }

    fn load(&self, id: AggregateId) -> DomainResult<Identity> {
        self.repository
            .load_by_id(id)
            .map_err(DomainError::from)
            .or_error(move || DomainError::not_found(IDENTITY, id))
    }

    fn announce_update(&self, updated: DomainResult<Identity>) -> DomainResult<Identity> {
        let publisher = self.publisher.clone();

        updated.flat_map(move |identity| {
            tracing::info!(identity_id = %identity.id, "Identity updated");
            let event = DomainEvent::with_snapshot(identity.id, identity.snapshot());
            announce_committed(publisher.as_ref(), event, EventAction::Update, identity.with_sorted_roles())
        })
    }
}
