use serde::{Deserialize, Serialize};

use super::id::AggregateId;

/// Read-only copy of a remote identity, held by the pet and vet services for
/// display and linking. Never authoritative, possibly stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerProjection {
    pub id: AggregateId,
    pub first_name: String,
    pub last_name: String,
}

impl OwnerProjection {
    pub fn new(id: AggregateId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
