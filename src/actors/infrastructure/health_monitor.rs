use std::collections::BTreeMap;

use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::actors::core::{overall_status, ComponentHealth, HealthStatus};

// ============================================================================
// Health Monitor Actor - aggregates component health
// ============================================================================
//
// Components report with `UpdateHealth` (fire and forget); the /health
// endpoint asks with `GetSystemHealth`.
//
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone, Serialize, MessageResponse)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

#[derive(Default)]
pub struct HealthMonitorActor {
    components: BTreeMap<String, ComponentHealth>,
}

impl HealthMonitorActor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor started");
    }
}

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Self::Context) {
        let changed = self
            .components
            .get(&msg.component)
            .map_or(true, |previous| previous.status != msg.status);

        if changed {
            match &msg.status {
                HealthStatus::Healthy => tracing::info!(component = %msg.component, "Component healthy"),
                HealthStatus::Degraded(reason) => {
                    tracing::warn!(component = %msg.component, reason = %reason, "Component degraded")
                }
                HealthStatus::Unhealthy(reason) => {
                    tracing::error!(component = %msg.component, reason = %reason, "Component unhealthy")
                }
            }
        }

        let health = ComponentHealth::new(msg.component.clone(), msg.status).with_details(msg.details);
        self.components.insert(msg.component, health);
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = SystemHealth;

    fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Self::Context) -> Self::Result {
        SystemHealth {
            overall_status: overall_status(self.components.values()),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}
