use std::sync::Arc;

use crate::cache::OwnerResolutionCache;
use crate::domain::shared::{
    announce_committed, AggregateId, CascadeOnRemoteDelete, CascadeReport, DomainError, DomainEvent, DomainResult,
    EventAction, EventPublishPort, Page, PageRequest, RepositoryError,
};
use crate::reactive::AsyncResult;

use super::aggregate::{Vet, VetDetails};
use super::commands::{CreateVet, UpdateSpecialities};
use super::events::VetSnapshot;
use super::ports::VetRepository;

const VET: &str = "vet";
const IDENTITY: &str = "identity";

// ============================================================================
// Vet Command Handler
// ============================================================================

pub struct VetCommandHandler {
    repository: Arc<dyn VetRepository>,
    publisher: Arc<dyn EventPublishPort<VetSnapshot>>,
    identities: OwnerResolutionCache,
}

impl VetCommandHandler {
    pub fn new(
        repository: Arc<dyn VetRepository>,
        publisher: Arc<dyn EventPublishPort<VetSnapshot>>,
        identities: OwnerResolutionCache,
    ) -> Self {
        Self {
            repository,
            publisher,
            identities,
        }
    }

    /// Create the vet profile of an existing identity.
    ///
    /// Fails with AlreadyInDesiredState if the identity already has one and
    /// with ReferenceNotFound if the identity does not exist; neither case
    /// writes anything.
    pub fn create(&self, command: CreateVet) -> DomainResult<VetDetails> {
        let identity_id = command.identity_id;
        let vet = match Vet::create(AggregateId::new(), identity_id, &command.specialities) {
            Ok(vet) => vet,
            Err(e) => return AsyncResult::error(e.into()),
        };

        let identities = self.identities.clone();
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.repository
            .find_by_identity(identity_id)
            .collect()
            .map_err(DomainError::from)
            .flat_map(move |existing| {
                if let Some(current) = existing.first() {
                    return AsyncResult::error(DomainError::already(format!(
                        "identity {identity_id} already has vet {}",
                        current.id
                    )));
                }

                identities
                    .get(identity_id)
                    .or_error(move || DomainError::ReferenceNotFound {
                        kind: IDENTITY,
                        id: identity_id,
                    })
                    .flat_map(move |identity| {
                        repository
                            .create(vet)
                            .map_err(move |error| match error {
                                // Lost a race with a concurrent create for the same identity.
                                RepositoryError::Conflict { .. } => {
                                    DomainError::already(format!("identity {identity_id} already has a vet"))
                                }
                                other => other.into(),
                            })
                            .map(move |vet| VetDetails {
                                vet,
                                identity: Some(identity),
                            })
                    })
            })
            .flat_map(move |details| {
                tracing::info!(vet_id = %details.vet.id, identity_id = %identity_id, "Vet created");
                let event = DomainEvent::with_snapshot(details.vet.id, details.vet.snapshot());
                announce_committed(publisher.as_ref(), event, EventAction::Create, details)
            })
    }

    pub fn update_specialities(&self, vet_id: AggregateId, command: UpdateSpecialities) -> DomainResult<Vet> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.load(vet_id)
            .flat_map(move |mut vet| match vet.replace_specialities(&command.specialities) {
                Ok(true) => repository.update(vet).map_err(DomainError::from),
                Ok(false) => AsyncResult::error(DomainError::already(format!(
                    "vet {vet_id} already has these specialities"
                ))),
                Err(e) => AsyncResult::error(e.into()),
            })
            .flat_map(move |vet| {
                tracing::info!(vet_id = %vet.id, "Vet specialities updated");
                let event = DomainEvent::with_snapshot(vet.id, vet.snapshot());
                announce_committed(publisher.as_ref(), event, EventAction::Update, vet.with_sorted_specialities())
            })
    }

    pub fn delete(&self, vet_id: AggregateId) -> DomainResult<()> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.load(vet_id)
            .flat_map(move |_| repository.delete(vet_id).map_err(DomainError::from))
            .flat_map(move |removed| {
                if !removed {
                    return AsyncResult::error(DomainError::conflict(format!("vet {vet_id} cannot be deleted")));
                }
                tracing::info!(vet_id = %vet_id, "🗑️ Vet deleted");
                announce_committed(publisher.as_ref(), DomainEvent::deleted(vet_id), EventAction::Delete, ())
            })
    }

    /// Remove the vet profile(s) of a deleted identity. Safe to repeat.
    pub fn remove_vets_for_identity(&self, identity_id: AggregateId) -> DomainResult<CascadeReport> {
        let repository = self.repository.clone();
        let publisher = self.publisher.clone();

        self.repository
            .find_by_identity(identity_id)
            .collect()
            .map_err(DomainError::from)
            .flat_map(move |vets| {
                AsyncResult::new(async move {
                    let mut report = CascadeReport::default();

                    for vet in vets {
                        if !repository.delete(vet.id).await? {
                            continue;
                        }
                        announce_committed(publisher.as_ref(), DomainEvent::deleted(vet.id), EventAction::Delete, ())
                            .await?;
                        report.removed += 1;
                    }

                    tracing::info!(
                        identity_id = %identity_id,
                        removed = report.removed,
                        "Vets of deleted identity removed"
                    );
                    Ok::<_, DomainError>(report)
                })
            })
    }

    pub fn search(&self, page: PageRequest) -> DomainResult<Page<VetDetails>> {
        let identities = self.identities.clone();

        let items = self
            .repository
            .find_page(page)
            .map_err(DomainError::from)
            .zip_resolved(|vet: &Vet| Some(vet.identity_id), move |id| identities.get(id))
            .map(|(vet, identity)| VetDetails {
                vet: vet.with_sorted_specialities(),
                identity,
            })
            .collect();

        self.repository
            .count_all()
            .map_err(DomainError::from)
            .zip(items)
            .map(move |(total, items)| Page::new(page, items, total))
    }

    fn load(&self, vet_id: AggregateId) -> DomainResult<Vet> {
        self.repository
            .load_by_id(vet_id)
            .map_err(DomainError::from)
            .or_error(move || DomainError::not_found(VET, vet_id))
    }
}

impl CascadeOnRemoteDelete for VetCommandHandler {
    fn on_remote_delete(&self, remote_id: AggregateId) -> DomainResult<CascadeReport> {
        self.remove_vets_for_identity(remote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryProjectionStore;
    use crate::domain::shared::{MockOwnerLookup, OwnerProjection, VET_TOPIC};
    use crate::domain::vet::{MockVetRepository, Speciality};
    use crate::messaging::{InMemoryProducer, TopicPublisher};
    use crate::persistence::memory::InMemoryVetRepository;
    use std::future::IntoFuture;

    struct Fixture {
        handler: VetCommandHandler,
        producer: Arc<InMemoryProducer>,
    }

    fn fixture(repository: Arc<dyn VetRepository>, lookup: MockOwnerLookup) -> Fixture {
        let producer = Arc::new(InMemoryProducer::default());
        let publisher = Arc::new(TopicPublisher::new(VET_TOPIC, producer.clone()));
        let identities = OwnerResolutionCache::new(Arc::new(InMemoryProjectionStore::default()), Arc::new(lookup));
        Fixture {
            handler: VetCommandHandler::new(repository, publisher, identities),
            producer,
        }
    }

    fn resolving_lookup() -> MockOwnerLookup {
        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .returning(|id| AsyncResult::succeeded(Some(OwnerProjection::new(id, "James", "Carter"))));
        lookup
    }

    fn create_command(identity_id: AggregateId) -> CreateVet {
        CreateVet {
            identity_id,
            specialities: vec!["surgery".to_string(), "radiology".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_for_unknown_identity_never_writes() {
        let mut repository = MockVetRepository::new();
        repository
            .expect_find_by_identity()
            .returning(|_| crate::reactive::AsyncCollection::from_values(Vec::new()));
        repository.expect_create().never();
        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().returning(|_| AsyncResult::succeeded(None));
        let fx = fixture(Arc::new(repository), lookup);

        let identity_id = AggregateId::new();
        let result = fx.handler.create(create_command(identity_id)).await;

        assert_eq!(
            result,
            Err(DomainError::ReferenceNotFound {
                kind: "identity",
                id: identity_id
            })
        );
        assert!(fx.producer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_second_vet_for_identity_is_already_in_desired_state() {
        let fx = fixture(Arc::new(InMemoryVetRepository::default()), resolving_lookup());
        let identity_id = AggregateId::new();

        let created = fx.handler.create(create_command(identity_id)).await.unwrap();
        assert_eq!(created.identity.unwrap().display_name(), "James Carter");

        let again = fx.handler.create(create_command(identity_id)).await;
        assert!(matches!(again, Err(DomainError::AlreadyInDesiredState { .. })));
        assert_eq!(fx.producer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_for_one_identity_write_one_vet() {
        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().returning(|id| {
            AsyncResult::new(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(Some(OwnerProjection::new(id, "James", "Carter")))
            })
        });
        let repository = Arc::new(InMemoryVetRepository::default());
        let fx = fixture(repository.clone(), lookup);
        let identity_id = AggregateId::new();

        let (first, second) = tokio::join!(
            fx.handler.create(create_command(identity_id)).into_future(),
            fx.handler.create(create_command(identity_id)).into_future()
        );

        assert_eq!([&first, &second].iter().filter(|r| r.is_ok()).count(), 1);
        assert!([first, second]
            .into_iter()
            .any(|r| matches!(r, Err(DomainError::AlreadyInDesiredState { .. }))));
        assert_eq!(repository.find_by_identity(identity_id).collect().await.unwrap().len(), 1);
        assert_eq!(fx.producer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_specialities_publishes_update() {
        let fx = fixture(Arc::new(InMemoryVetRepository::default()), resolving_lookup());
        let created = fx.handler.create(create_command(AggregateId::new())).await.unwrap();
        fx.producer.drain().await;

        let unchanged = fx
            .handler
            .update_specialities(
                created.vet.id,
                UpdateSpecialities {
                    specialities: vec!["Radiology".to_string(), "surgery".to_string()],
                },
            )
            .await;
        assert!(matches!(unchanged, Err(DomainError::AlreadyInDesiredState { .. })));

        let updated = fx
            .handler
            .update_specialities(
                created.vet.id,
                UpdateSpecialities {
                    specialities: vec!["dentistry".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.specialities, vec![Speciality::new("dentistry").unwrap()]);

        let sent = fx.producer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action, EventAction::Update);
    }

    #[tokio::test]
    async fn test_delete_unknown_vet_is_not_found() {
        let fx = fixture(Arc::new(InMemoryVetRepository::default()), MockOwnerLookup::new());
        let result = fx.handler.delete(AggregateId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound { kind: "vet", .. })));
    }

    #[tokio::test]
    async fn test_remove_vets_for_identity_is_idempotent() {
        let fx = fixture(Arc::new(InMemoryVetRepository::default()), resolving_lookup());
        let identity_id = AggregateId::new();
        fx.handler.create(create_command(identity_id)).await.unwrap();
        fx.producer.drain().await;

        let first = fx.handler.on_remote_delete(identity_id).await.unwrap();
        let second = fx.handler.on_remote_delete(identity_id).await.unwrap();

        assert_eq!(first.removed, 1);
        assert_eq!(second.removed, 0);
        assert_eq!(fx.producer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_search_attaches_identity_and_sorts_specialities() {
        let fx = fixture(Arc::new(InMemoryVetRepository::default()), resolving_lookup());
        fx.handler.create(create_command(AggregateId::new())).await.unwrap();

        let page = fx.handler.search(PageRequest::default()).await.unwrap();

        assert_eq!(page.total, 1);
        let details = &page.items[0];
        assert!(details.identity.is_some());
        let names: Vec<_> = details.vet.specialities.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["radiology", "surgery"]);
    }
}
