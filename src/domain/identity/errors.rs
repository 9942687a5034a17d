use crate::domain::shared::DomainError;

// ============================================================================
// Identity Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("First name cannot be empty")]
    EmptyFirstName,

    #[error("Last name cannot be empty")]
    EmptyLastName,

    #[error("Role name cannot be empty")]
    EmptyRoleName,

    #[error("Role {0} is already assigned")]
    RoleAlreadyAssigned(String),
}

impl From<IdentityError> for DomainError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::RoleAlreadyAssigned(_) => DomainError::already(error.to_string()),
            other => DomainError::invalid(other.to_string()),
        }
    }
}
