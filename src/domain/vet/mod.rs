// ============================================================================
// Vet Domain
// ============================================================================
//
// A vet is the veterinary profile of one identity. At most one vet exists
// per identity; it is removed when the identity is deleted upstream.
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod ports;

pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use ports::*;
