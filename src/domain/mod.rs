// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Events (the public snapshot announced on its topic)
// - Commands
// - Errors (business rules, converted into the shared DomainError)
// - Aggregate implementation
// - Ports (persistence contract)
// - Command handler (one orchestrator per use case)
//
// `shared` holds what every service agrees on. Handlers only see ports;
// adapters live in `persistence`, `lookup`, `cache` and `messaging`.
//
// ============================================================================

pub mod identity;
pub mod pet;
pub mod shared;
pub mod vet;
