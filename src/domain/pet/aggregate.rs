use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::shared::{AggregateId, OwnerProjection};

use super::errors::PetError;
use super::events::PetSnapshot;

// ============================================================================
// Pet Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pet {
    pub id: AggregateId,
    pub name: String,
    pub species: String,
    pub birth_date: Option<NaiveDate>,
    pub owner_id: Option<AggregateId>,
}

impl Pet {
    pub fn create(
        id: AggregateId,
        name: &str,
        species: &str,
        birth_date: Option<NaiveDate>,
    ) -> Result<Self, PetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PetError::EmptyName);
        }
        let species = species.trim();
        if species.is_empty() {
            return Err(PetError::EmptySpecies);
        }

        Ok(Self {
            id,
            name: name.to_string(),
            species: species.to_lowercase(),
            birth_date,
            owner_id: None,
        })
    }

    /// Link to `owner_id`. Re-homing from another owner is allowed; linking
    /// to the current owner is not.
    pub fn adopt(&mut self, owner_id: AggregateId) -> Result<(), PetError> {
        if self.owner_id == Some(owner_id) {
            return Err(PetError::AlreadyOwnedBy(owner_id));
        }
        self.owner_id = Some(owner_id);
        Ok(())
    }

    pub fn snapshot(&self) -> PetSnapshot {
        PetSnapshot {
            name: self.name.clone(),
            species: self.species.clone(),
            birth_date: self.birth_date,
            owner_id: self.owner_id,
        }
    }
}

/// A pet with its owner's projection attached, when it has one that still
/// resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetDetails {
    #[serde(flatten)]
    pub pet: Pet,
    pub owner: Option<OwnerProjection>,
}
