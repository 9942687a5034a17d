use serde::Serialize;

use crate::domain::shared::AggregateId;

/// Public projection published with CREATE / UPDATE on the vet topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VetSnapshot {
    pub identity_id: AggregateId,
    /// Speciality names, alphabetical.
    pub specialities: Vec<String>,
}
