use serde::Serialize;

use crate::domain::shared::{AggregateId, OwnerProjection};

use super::errors::IdentityError;
use super::events::IdentitySnapshot;
use super::value_objects::{person_name, Role};

// ============================================================================
// Identity Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: AggregateId,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
}

impl Identity {
    pub fn create(
        id: AggregateId,
        first_name: &str,
        last_name: &str,
        roles: &[String],
    ) -> Result<Self, IdentityError> {
        let mut identity = Self {
            id,
            first_name: person_name(first_name, IdentityError::EmptyFirstName)?,
            last_name: person_name(last_name, IdentityError::EmptyLastName)?,
            roles: Vec::new(),
        };

        for raw in roles {
            let role = Role::new(raw)?;
            if !identity.roles.contains(&role) {
                identity.roles.push(role);
            }
        }

        Ok(identity)
    }

    pub fn rename(&mut self, first_name: &str, last_name: &str) -> Result<(), IdentityError> {
        self.first_name = person_name(first_name, IdentityError::EmptyFirstName)?;
        self.last_name = person_name(last_name, IdentityError::EmptyLastName)?;
        Ok(())
    }

    pub fn assign_role(&mut self, name: &str) -> Result<(), IdentityError> {
        let role = Role::new(name)?;
        if self.roles.contains(&role) {
            return Err(IdentityError::RoleAlreadyAssigned(role.name));
        }
        self.roles.push(role);
        Ok(())
    }

    /// Same identity with roles in alphabetical order, the order every
    /// response uses.
    pub fn with_sorted_roles(mut self) -> Self {
        self.roles.sort();
        self
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        let mut roles: Vec<String> = self.roles.iter().map(|r| r.name.clone()).collect();
        roles.sort();

        IdentitySnapshot {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            roles,
        }
    }

    pub fn projection(&self) -> OwnerProjection {
        OwnerProjection::new(self.id, self.first_name.clone(), self.last_name.clone())
    }
}
