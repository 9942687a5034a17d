// ============================================================================
// Pet clinic choreography
// ============================================================================
//
// Identity, pet and vet services that converge through lifecycle events
// instead of shared storage. One library; the binary runs one role.
//
// ============================================================================

pub mod actors;
pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod lookup;
pub mod messaging;
pub mod metrics;
pub mod persistence;
pub mod reactive;
pub mod telemetry;
pub mod utils;
