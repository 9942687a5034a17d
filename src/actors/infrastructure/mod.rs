// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// - Health monitoring
// - Consumer supervision and shutdown
//
// ============================================================================

mod coordinator;
mod health_monitor;

pub use coordinator::{CoordinatorActor, Shutdown};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
