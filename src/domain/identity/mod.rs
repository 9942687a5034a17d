// ============================================================================
// Identity Domain - authoritative owner of people and their roles
// ============================================================================
//
// The identity service is upstream of the choreography: it publishes
// CREATE / UPDATE / DELETE on the `identity` topic and consumes nothing.
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod ports;
pub mod value_objects;

pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use ports::*;
pub use value_objects::*;
