use crate::domain::shared::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VetError {
    #[error("Speciality name cannot be empty")]
    EmptySpeciality,
}

impl From<VetError> for DomainError {
    fn from(error: VetError) -> Self {
        DomainError::invalid(error.to_string())
    }
}
