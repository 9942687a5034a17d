use serde::{Deserialize, Serialize};

use super::errors::IdentityError;

// ============================================================================
// Identity Value Objects
// ============================================================================

/// A named role (OWNER, VET, ...). Names are trimmed and upper-cased so
/// "owner" and " OWNER" are the same role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
}

impl Role {
    pub fn new(name: &str) -> Result<Self, IdentityError> {
        let name = name.trim().to_uppercase();
        if name.is_empty() {
            return Err(IdentityError::EmptyRoleName);
        }
        Ok(Self { name })
    }
}

/// Non-empty, trimmed person name.
pub(crate) fn person_name(raw: &str, on_empty: IdentityError) -> Result<String, IdentityError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(on_empty);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_are_normalized() {
        assert_eq!(Role::new(" owner ").unwrap(), Role::new("OWNER").unwrap());
        assert!(matches!(Role::new("  "), Err(IdentityError::EmptyRoleName)));
    }
}
