// ============================================================================
// Cross-service convergence
// ============================================================================
//
// Identity, pet and vet services wired together in process: the identity
// service's announcements are fed to the dependent services' choreography
// handlers the way a broker would deliver them.
//
// ============================================================================

use std::sync::Arc;

use crate::cache::{InMemoryProjectionStore, OwnerResolutionCache};
use crate::domain::identity::{CreateIdentity, IdentityCommandHandler, IdentityRepository};
use crate::domain::pet::{CreatePet, PetCommandHandler};
use crate::domain::shared::{
    AggregateId, EventAction, LookupError, OwnerLookup, OwnerProjection, PageRequest, IDENTITY_TOPIC, PET_TOPIC,
    VET_TOPIC,
};
use crate::domain::vet::{CreateVet, VetCommandHandler};
use crate::persistence::{InMemoryIdentityRepository, InMemoryPetRepository, InMemoryVetRepository};
use crate::reactive::AsyncResult;

use super::{DeleteChoreography, InMemoryProducer, InboundMessage, MessageHandler, MessageOutcome, TopicPublisher};

/// Answers owner lookups straight from the identity service's repository.
struct IdentityServiceLookup {
    identities: Arc<InMemoryIdentityRepository>,
}

impl OwnerLookup for IdentityServiceLookup {
    fn lookup(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, LookupError> {
        self.identities
            .load_by_id(id)
            .map(|identity| identity.map(|i| i.projection()))
            .map_err(|e| LookupError::Transport { message: e.to_string() })
    }
}

struct Clinic {
    identities: IdentityCommandHandler,
    identity_events: Arc<InMemoryProducer>,
    pets: Arc<PetCommandHandler>,
    pet_events: Arc<InMemoryProducer>,
    vets: Arc<VetCommandHandler>,
    pet_projections: InMemoryProjectionStore,
    pet_choreography: DeleteChoreography,
    vet_choreography: DeleteChoreography,
}

fn clinic() -> Clinic {
    let identity_repository = Arc::new(InMemoryIdentityRepository::default());
    let identity_events = Arc::new(InMemoryProducer::default());
    let identities = IdentityCommandHandler::new(
        identity_repository.clone(),
        Arc::new(TopicPublisher::new(IDENTITY_TOPIC, identity_events.clone())),
    );

    let lookup = Arc::new(IdentityServiceLookup {
        identities: identity_repository,
    });

    let pet_projections = InMemoryProjectionStore::default();
    let owners = OwnerResolutionCache::new(Arc::new(pet_projections.clone()), lookup.clone());
    let pet_events = Arc::new(InMemoryProducer::default());
    let pets = Arc::new(PetCommandHandler::new(
        Arc::new(InMemoryPetRepository::default()),
        Arc::new(TopicPublisher::new(PET_TOPIC, pet_events.clone())),
        owners.clone(),
    ));

    let vet_identities = OwnerResolutionCache::new(Arc::new(InMemoryProjectionStore::default()), lookup);
    let vets = Arc::new(VetCommandHandler::new(
        Arc::new(InMemoryVetRepository::default()),
        Arc::new(TopicPublisher::new(VET_TOPIC, Arc::new(InMemoryProducer::default()))),
        vet_identities.clone(),
    ));

    Clinic {
        identities,
        identity_events,
        pet_choreography: DeleteChoreography::new(IDENTITY_TOPIC, pets.clone()).with_cache(owners),
        vet_choreography: DeleteChoreography::new(IDENTITY_TOPIC, vets.clone()).with_cache(vet_identities),
        pets,
        pet_events,
        vets,
        pet_projections,
    }
}

fn pet(name: &str, owner_id: Option<AggregateId>) -> CreatePet {
    CreatePet {
        name: name.to_string(),
        species: "dog".to_string(),
        birth_date: None,
        owner_id,
    }
}

/// Deliver everything the identity service announced since the last call.
async fn deliver(clinic: &Clinic) -> Vec<(MessageOutcome, MessageOutcome)> {
    let mut outcomes = Vec::new();
    for message in clinic.identity_events.drain().await {
        let inbound = InboundMessage::from(message);
        outcomes.push((
            clinic.pet_choreography.handle(&inbound).await,
            clinic.vet_choreography.handle(&inbound).await,
        ));
    }
    outcomes
}

#[tokio::test]
async fn test_identity_delete_cascades_to_pets_and_vets() {
    let clinic = clinic();

    let owner = clinic
        .identities
        .create(CreateIdentity {
            first_name: "Betty".to_string(),
            last_name: "Davis".to_string(),
            roles: vec!["owner".to_string()],
        })
        .await
        .unwrap();

    clinic.pets.create(pet("Rosy", Some(owner.id))).await.unwrap();
    clinic.pets.create(pet("Jewel", Some(owner.id))).await.unwrap();
    clinic.pets.create(pet("Stray", None)).await.unwrap();
    clinic
        .vets
        .create(CreateVet {
            identity_id: owner.id,
            specialities: vec!["surgery".to_string()],
        })
        .await
        .unwrap();

    // CREATE is not something the dependents react to.
    let outcomes = deliver(&clinic).await;
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].0, MessageOutcome::Ignored { .. }));

    let before = clinic.pets.search(PageRequest::default()).await.unwrap();
    assert_eq!(before.total, 3);
    assert!(clinic.pet_projections.contains(owner.id).await);

    clinic.identities.delete(owner.id).await.unwrap();
    clinic.pet_events.drain().await;

    let outcomes = deliver(&clinic).await;
    assert_eq!(
        outcomes,
        vec![(MessageOutcome::Applied { removed: 2 }, MessageOutcome::Applied { removed: 1 })]
    );
    assert!(!clinic.pet_projections.contains(owner.id).await);

    let announced = clinic.pet_events.drain().await;
    assert_eq!(announced.len(), 2);
    assert!(announced.iter().all(|m| m.action == EventAction::Delete && m.body.is_none()));

    let after = clinic.pets.search(PageRequest::default()).await.unwrap();
    assert_eq!(after.total, 1);
    assert_eq!(after.items[0].pet.name, "Stray");
    assert_eq!(clinic.vets.search(PageRequest::default()).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_redelivered_delete_is_a_no_op() {
    let clinic = clinic();

    let owner = clinic
        .identities
        .create(CreateIdentity {
            first_name: "Eduardo".to_string(),
            last_name: "Rodriquez".to_string(),
            roles: Vec::new(),
        })
        .await
        .unwrap();
    clinic.pets.create(pet("Rosy", Some(owner.id))).await.unwrap();
    clinic.identities.delete(owner.id).await.unwrap();

    let messages = clinic.identity_events.drain().await;
    let delete = messages
        .into_iter()
        .find(|m| m.action == EventAction::Delete)
        .map(InboundMessage::from)
        .unwrap();

    assert_eq!(
        clinic.pet_choreography.handle(&delete).await,
        MessageOutcome::Applied { removed: 1 }
    );
    assert_eq!(
        clinic.pet_choreography.handle(&delete).await,
        MessageOutcome::Applied { removed: 0 }
    );
}

#[tokio::test]
async fn test_pet_for_deleted_owner_is_rejected_after_convergence() {
    let clinic = clinic();

    let owner = clinic
        .identities
        .create(CreateIdentity {
            first_name: "Harold".to_string(),
            last_name: "Davis".to_string(),
            roles: Vec::new(),
        })
        .await
        .unwrap();
    clinic.pets.create(pet("Iggy", Some(owner.id))).await.unwrap();
    clinic.identities.delete(owner.id).await.unwrap();
    deliver(&clinic).await;

    let result = clinic.pets.create(pet("George", Some(owner.id))).await;
    assert_eq!(
        result.map(|_| ()),
        Err(crate::domain::shared::DomainError::ReferenceNotFound {
            kind: "owner",
            id: owner.id
        })
    );
}
