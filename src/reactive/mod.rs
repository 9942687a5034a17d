// ============================================================================
// Reactive Composition
// ============================================================================
//
// Single-value and multi-value asynchronous containers every use case is
// composed from. Ports return them, orchestrators chain them with
// map / flat_map, and the HTTP boundary or the consumer loop awaits them.
//
// ============================================================================

mod async_collection;
mod async_result;

pub use async_collection::AsyncCollection;
pub use async_result::AsyncResult;
