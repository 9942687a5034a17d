use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::shared::AggregateId;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePet {
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub owner_id: Option<AggregateId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdoptPet {
    pub owner_id: AggregateId,
}
