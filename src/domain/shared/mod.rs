// ============================================================================
// Shared Kernel
// ============================================================================
//
// Types every service agrees on: aggregate identity, the event/action pair
// that crosses the broker, the owner projection held by downstream services,
// paging and the failure taxonomy.
//
// ============================================================================

pub mod errors;
pub mod events;
pub mod id;
pub mod paging;
pub mod ports;
pub mod projection;

pub use errors::*;
pub use events::*;
pub use id::*;
pub use paging::*;
pub use ports::*;
pub use projection::*;
