// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for the long-running parts of the service.
//
// Structure:
// - core/           - health types shared by every component
// - infrastructure/ - health monitor and consumer coordinator
//
// Note: Domain logic goes through the command handlers, NOT actors.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

mod core;
mod infrastructure;

pub use core::{overall_status, ComponentHealth, HealthStatus};
pub use infrastructure::{CoordinatorActor, GetSystemHealth, HealthMonitorActor, Shutdown, SystemHealth, UpdateHealth};
