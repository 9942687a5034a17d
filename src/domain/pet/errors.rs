use crate::domain::shared::{AggregateId, DomainError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PetError {
    #[error("Pet name cannot be empty")]
    EmptyName,

    #[error("Pet species cannot be empty")]
    EmptySpecies,

    #[error("Pet is already owned by {0}")]
    AlreadyOwnedBy(AggregateId),
}

impl From<PetError> for DomainError {
    fn from(error: PetError) -> Self {
        match error {
            PetError::AlreadyOwnedBy(_) => DomainError::already(error.to_string()),
            other => DomainError::invalid(other.to_string()),
        }
    }
}
