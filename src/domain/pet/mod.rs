// ============================================================================
// Pet Domain
// ============================================================================
//
// Pets reference their owner by identity id. The owner itself lives in the
// identity service; this service only ever holds its projection, through the
// owner-resolution cache.
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
