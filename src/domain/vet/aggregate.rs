use serde::Serialize;

use crate::domain::shared::{AggregateId, OwnerProjection};

use super::errors::VetError;
use super::events::VetSnapshot;

// ============================================================================
// Vet Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Speciality {
    pub name: String,
}

impl Speciality {
    pub fn new(name: &str) -> Result<Self, VetError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(VetError::EmptySpeciality);
        }
        Ok(Self { name })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vet {
    pub id: AggregateId,
    pub identity_id: AggregateId,
    pub specialities: Vec<Speciality>,
}

impl Vet {
    /// Specialities are de-duplicated and kept alphabetical.
    pub fn create(id: AggregateId, identity_id: AggregateId, specialities: &[String]) -> Result<Self, VetError> {
        let mut parsed = specialities
            .iter()
            .map(|s| Speciality::new(s))
            .collect::<Result<Vec<_>, _>>()?;
        parsed.sort();
        parsed.dedup();

        Ok(Self {
            id,
            identity_id,
            specialities: parsed,
        })
    }

    /// Replace the speciality set; `false` when it was already that set.
    pub fn replace_specialities(&mut self, specialities: &[String]) -> Result<bool, VetError> {
        let replacement = Self::create(self.id, self.identity_id, specialities)?.specialities;
        if replacement == self.specialities {
            return Ok(false);
        }
        self.specialities = replacement;
        Ok(true)
    }

    pub fn with_sorted_specialities(mut self) -> Self {
        self.specialities.sort();
        self
    }

    pub fn snapshot(&self) -> VetSnapshot {
        let mut specialities: Vec<String> = self.specialities.iter().map(|s| s.name.clone()).collect();
        specialities.sort();

        VetSnapshot {
            identity_id: self.identity_id,
            specialities,
        }
    }
}

/// A vet with the projection of its identity, when that still resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VetDetails {
    #[serde(flatten)]
    pub vet: Vet,
    pub identity: Option<OwnerProjection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialities_are_normalized_sorted_and_unique() {
        let names: Vec<String> = ["Surgery", "radiology", " surgery "].iter().map(|s| s.to_string()).collect();
        let vet = Vet::create(AggregateId::new(), AggregateId::new(), &names).unwrap();

        let sorted: Vec<_> = vet.specialities.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(sorted, vec!["radiology", "surgery"]);
    }

    #[test]
    fn test_replace_reports_whether_anything_changed() {
        let mut vet = Vet::create(AggregateId::new(), AggregateId::new(), &["surgery".to_string()]).unwrap();
        assert_eq!(vet.replace_specialities(&["Surgery".to_string()]), Ok(false));
        assert_eq!(vet.replace_specialities(&["dentistry".to_string()]), Ok(true));
        assert_eq!(vet.specialities, vec![Speciality::new("dentistry").unwrap()]);
    }

    #[test]
    fn test_blank_speciality_is_rejected() {
        let result = Vet::create(AggregateId::new(), AggregateId::new(), &["".to_string()]);
        assert_eq!(result, Err(VetError::EmptySpeciality));
    }
}
