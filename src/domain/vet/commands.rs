use serde::Deserialize;

use crate::domain::shared::AggregateId;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVet {
    pub identity_id: AggregateId,
    #[serde(default)]
    pub specialities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSpecialities {
    pub specialities: Vec<String>,
}
