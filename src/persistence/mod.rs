// ============================================================================
// Persistence adapters
// ============================================================================
//
// memory   - process-local tables, used in tests and when no DATABASE_URL
// postgres - sqlx over PostgreSQL, schema created at startup
//
// ============================================================================

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryDeadLetterStore, InMemoryIdentityRepository, InMemoryPetRepository, InMemoryVetRepository};
pub use postgres::{
    ensure_schema, PostgresDeadLetterStore, PostgresIdentityRepository, PostgresPetRepository, PostgresVetRepository,
};
