use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::shared::AggregateId;

/// Public projection published with CREATE / UPDATE on the pet topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetSnapshot {
    pub name: String,
    pub species: String,
    pub birth_date: Option<NaiveDate>,
    pub owner_id: Option<AggregateId>,
}
