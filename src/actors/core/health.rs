use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Health Abstractions
// ============================================================================
//
// Components (consumers, the producer's circuit breaker) push their status
// to the health monitor; the monitor folds them into one overall status.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }
}

/// Any unhealthy component makes the whole service unhealthy; otherwise a
/// single degraded component degrades it.
pub fn overall_status<'a>(components: impl IntoIterator<Item = &'a ComponentHealth>) -> HealthStatus {
    let mut degraded = Vec::new();
    let mut unhealthy = Vec::new();

    for health in components {
        match &health.status {
            HealthStatus::Unhealthy(reason) => unhealthy.push(format!("{}: {}", health.name, reason)),
            HealthStatus::Degraded(reason) => degraded.push(format!("{}: {}", health.name, reason)),
            HealthStatus::Healthy => {}
        }
    }

    if !unhealthy.is_empty() {
        unhealthy.sort();
        HealthStatus::Unhealthy(unhealthy.join(", "))
    } else if !degraded.is_empty() {
        degraded.sort();
        HealthStatus::Degraded(degraded.join(", "))
    } else {
        HealthStatus::Healthy
    }
}
