use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::identity::{Identity, IdentityRepository, Role};
use crate::domain::pet::{Pet, PetRepository};
use crate::domain::shared::{AggregateId, EventAction, PageRequest, RepositoryError};
use crate::domain::vet::{Speciality, Vet, VetRepository};
use crate::messaging::{DeadLetter, DeadLetterSource, DeadLetterStore};
use crate::reactive::{AsyncCollection, AsyncResult};

// ============================================================================
// PostgreSQL adapters
// ============================================================================
//
// One table per aggregate. Paging is ordered by insertion time then id so a
// page is stable while rows are only appended.
//
// ============================================================================

const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        id UUID PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        roles TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pets (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        species TEXT NOT NULL,
        birth_date DATE,
        owner_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS pets_owner_id_idx ON pets (owner_id)",
    r#"
    CREATE TABLE IF NOT EXISTS vets (
        id UUID PRIMARY KEY,
        identity_id UUID NOT NULL,
        specialities TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS vets_identity_id_key ON vets (identity_id)",
    r#"
    CREATE TABLE IF NOT EXISTS dead_letters (
        id UUID PRIMARY KEY,
        topic TEXT NOT NULL,
        message_key TEXT NOT NULL,
        action TEXT NOT NULL,
        body TEXT,
        error TEXT NOT NULL,
        attempts INTEGER NOT NULL,
        source TEXT NOT NULL,
        first_failed_at TIMESTAMPTZ NOT NULL,
        last_failed_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Create the tables this service owns. Safe to run on every start.
pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "📦 Database schema ready");
    Ok(())
}

fn map_sqlx(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => RepositoryError::Conflict {
            message: db.message().to_string(),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::connection(error.to_string())
        }
        _ => RepositoryError::query(error.to_string()),
    }
}

fn page_bounds(page: PageRequest) -> (i64, i64) {
    (
        i64::try_from(page.limit()).unwrap_or(i64::MAX),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn decoded<T>(rows: Vec<PgRow>, decode: fn(&PgRow) -> Result<T, sqlx::Error>) -> Result<Vec<T>, RepositoryError> {
    rows.iter().map(decode).collect::<Result<Vec<_>, _>>().map_err(map_sqlx)
}

fn count_rows(pool: PgPool, statement: &'static str) -> AsyncResult<u64, RepositoryError> {
    AsyncResult::new(async move {
        let count: i64 = sqlx::query(statement)
            .fetch_one(&pool)
            .await
            .and_then(|row| row.try_get(0))
            .map_err(map_sqlx)?;
        Ok(u64::try_from(count).unwrap_or_default())
    })
}

fn delete_row(pool: PgPool, statement: &'static str, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
    AsyncResult::new(async move {
        let result = sqlx::query(statement)
            .bind(id.as_uuid())
            .execute(&pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    })
}

fn vanished(kind: &str, id: AggregateId) -> RepositoryError {
    RepositoryError::Conflict {
        message: format!("{kind} {id} no longer exists"),
    }
}

// ============================================================================
// Identities
// ============================================================================

#[derive(Clone)]
pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn identity_from_row(row: &PgRow) -> Result<Identity, sqlx::Error> {
    let roles: Vec<String> = row.try_get("roles")?;
    Ok(Identity {
        id: AggregateId::from_uuid(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        roles: roles.into_iter().map(|name| Role { name }).collect(),
    })
}

fn role_names(identity: &Identity) -> Vec<String> {
    identity.roles.iter().map(|role| role.name.clone()).collect()
}

impl IdentityRepository for PostgresIdentityRepository {
    fn create(&self, identity: Identity) -> AsyncResult<Identity, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            sqlx::query("INSERT INTO identities (id, first_name, last_name, roles) VALUES ($1, $2, $3, $4)")
                .bind(identity.id.as_uuid())
                .bind(&identity.first_name)
                .bind(&identity.last_name)
                .bind(role_names(&identity))
                .execute(&pool)
                .await
                .map_err(map_sqlx)?;
            Ok(identity)
        })
    }

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Identity>, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let row = sqlx::query("SELECT id, first_name, last_name, roles FROM identities WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx)?;
            row.as_ref().map(identity_from_row).transpose().map_err(map_sqlx)
        })
    }

    fn update(&self, identity: Identity) -> AsyncResult<Identity, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let result = sqlx::query("UPDATE identities SET first_name = $2, last_name = $3, roles = $4 WHERE id = $1")
                .bind(identity.id.as_uuid())
                .bind(&identity.first_name)
                .bind(&identity.last_name)
                .bind(role_names(&identity))
                .execute(&pool)
                .await
                .map_err(map_sqlx)?;
            if result.rows_affected() == 0 {
                return Err(vanished("identity", identity.id));
            }
            Ok(identity)
        })
    }

    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        delete_row(self.pool.clone(), "DELETE FROM identities WHERE id = $1", id)
    }

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Identity, RepositoryError> {
        let pool = self.pool.clone();
        let (limit, offset) = page_bounds(page);
        AsyncCollection::from_batch(AsyncResult::new(async move {
            let rows = sqlx::query(
                "SELECT id, first_name, last_name, roles FROM identities ORDER BY created_at, id LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx)?;
            decoded(rows, identity_from_row)
        }))
    }

    fn count_all(&self) -> AsyncResult<u64, RepositoryError> {
        count_rows(self.pool.clone(), "SELECT COUNT(*) FROM identities")
    }
}

// ============================================================================
// Pets
// ============================================================================

#[derive(Clone)]
pub struct PostgresPetRepository {
    pool: PgPool,
}

impl PostgresPetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn pet_from_row(row: &PgRow) -> Result<Pet, sqlx::Error> {
    let owner_id: Option<Uuid> = row.try_get("owner_id")?;
    let birth_date: Option<NaiveDate> = row.try_get("birth_date")?;
    Ok(Pet {
        id: AggregateId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        species: row.try_get("species")?,
        birth_date,
        owner_id: owner_id.map(AggregateId::from_uuid),
    })
}

impl PetRepository for PostgresPetRepository {
    fn create(&self, pet: Pet) -> AsyncResult<Pet, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            sqlx::query("INSERT INTO pets (id, name, species, birth_date, owner_id) VALUES ($1, $2, $3, $4, $5)")
                .bind(pet.id.as_uuid())
                .bind(&pet.name)
                .bind(&pet.species)
                .bind(pet.birth_date)
                .bind(pet.owner_id.map(|id| id.as_uuid()))
                .execute(&pool)
                .await
                .map_err(map_sqlx)?;
            Ok(pet)
        })
    }

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Pet>, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let row = sqlx::query("SELECT id, name, species, birth_date, owner_id FROM pets WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx)?;
            row.as_ref().map(pet_from_row).transpose().map_err(map_sqlx)
        })
    }

    fn update(&self, pet: Pet) -> AsyncResult<Pet, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let result = sqlx::query(
                "UPDATE pets SET name = $2, species = $3, birth_date = $4, owner_id = $5 WHERE id = $1",
            )
            .bind(pet.id.as_uuid())
            .bind(&pet.name)
            .bind(&pet.species)
            .bind(pet.birth_date)
            .bind(pet.owner_id.map(|id| id.as_uuid()))
            .execute(&pool)
            .await
            .map_err(map_sqlx)?;
            if result.rows_affected() == 0 {
                return Err(vanished("pet", pet.id));
            }
            Ok(pet)
        })
    }

    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        delete_row(self.pool.clone(), "DELETE FROM pets WHERE id = $1", id)
    }

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Pet, RepositoryError> {
        let pool = self.pool.clone();
        let (limit, offset) = page_bounds(page);
        AsyncCollection::from_batch(AsyncResult::new(async move {
            let rows = sqlx::query(
                "SELECT id, name, species, birth_date, owner_id FROM pets ORDER BY created_at, id LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx)?;
            decoded(rows, pet_from_row)
        }))
    }

    fn count_all(&self) -> AsyncResult<u64, RepositoryError> {
        count_rows(self.pool.clone(), "SELECT COUNT(*) FROM pets")
    }

    fn find_by_owner(&self, owner_id: AggregateId) -> AsyncCollection<Pet, RepositoryError> {
        let pool = self.pool.clone();
        AsyncCollection::from_batch(AsyncResult::new(async move {
            let rows = sqlx::query(
                "SELECT id, name, species, birth_date, owner_id FROM pets WHERE owner_id = $1 ORDER BY created_at, id",
            )
            .bind(owner_id.as_uuid())
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx)?;
            decoded(rows, pet_from_row)
        }))
    }
}

// ============================================================================
// Vets
// ============================================================================

#[derive(Clone)]
pub struct PostgresVetRepository {
    pool: PgPool,
}

impl PostgresVetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn vet_from_row(row: &PgRow) -> Result<Vet, sqlx::Error> {
    let specialities: Vec<String> = row.try_get("specialities")?;
    Ok(Vet {
        id: AggregateId::from_uuid(row.try_get("id")?),
        identity_id: AggregateId::from_uuid(row.try_get("identity_id")?),
        specialities: specialities.into_iter().map(|name| Speciality { name }).collect(),
    })
}

fn speciality_names(vet: &Vet) -> Vec<String> {
    vet.specialities.iter().map(|s| s.name.clone()).collect()
}

impl VetRepository for PostgresVetRepository {
    fn create(&self, vet: Vet) -> AsyncResult<Vet, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            sqlx::query("INSERT INTO vets (id, identity_id, specialities) VALUES ($1, $2, $3)")
                .bind(vet.id.as_uuid())
                .bind(vet.identity_id.as_uuid())
                .bind(speciality_names(&vet))
                .execute(&pool)
                .await
                .map_err(map_sqlx)?;
            Ok(vet)
        })
    }

    fn load_by_id(&self, id: AggregateId) -> AsyncResult<Option<Vet>, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let row = sqlx::query("SELECT id, identity_id, specialities FROM vets WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx)?;
            row.as_ref().map(vet_from_row).transpose().map_err(map_sqlx)
        })
    }

    fn update(&self, vet: Vet) -> AsyncResult<Vet, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let result = sqlx::query("UPDATE vets SET identity_id = $2, specialities = $3 WHERE id = $1")
                .bind(vet.id.as_uuid())
                .bind(vet.identity_id.as_uuid())
                .bind(speciality_names(&vet))
                .execute(&pool)
                .await
                .map_err(map_sqlx)?;
            if result.rows_affected() == 0 {
                return Err(vanished("vet", vet.id));
            }
            Ok(vet)
        })
    }

    fn delete(&self, id: AggregateId) -> AsyncResult<bool, RepositoryError> {
        delete_row(self.pool.clone(), "DELETE FROM vets WHERE id = $1", id)
    }

    fn find_page(&self, page: PageRequest) -> AsyncCollection<Vet, RepositoryError> {
        let pool = self.pool.clone();
        let (limit, offset) = page_bounds(page);
        AsyncCollection::from_batch(AsyncResult::new(async move {
            let rows =
                sqlx::query("SELECT id, identity_id, specialities FROM vets ORDER BY created_at, id LIMIT $1 OFFSET $2")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&pool)
                    .await
                    .map_err(map_sqlx)?;
            decoded(rows, vet_from_row)
        }))
    }

    fn count_all(&self) -> AsyncResult<u64, RepositoryError> {
        count_rows(self.pool.clone(), "SELECT COUNT(*) FROM vets")
    }

    fn find_by_identity(&self, identity_id: AggregateId) -> AsyncCollection<Vet, RepositoryError> {
        let pool = self.pool.clone();
        AsyncCollection::from_batch(AsyncResult::new(async move {
            let rows = sqlx::query(
                "SELECT id, identity_id, specialities FROM vets WHERE identity_id = $1 ORDER BY created_at, id",
            )
            .bind(identity_id.as_uuid())
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx)?;
            decoded(rows, vet_from_row)
        }))
    }
}

// ============================================================================
// Dead letters
// ============================================================================

#[derive(Clone)]
pub struct PostgresDeadLetterStore {
    pool: PgPool,
}

impl PostgresDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn dead_letter_from_row(row: &PgRow) -> Result<DeadLetter, sqlx::Error> {
    let action: String = row.try_get("action")?;
    let source: String = row.try_get("source")?;
    let attempts: i32 = row.try_get("attempts")?;
    let first_failed_at: DateTime<Utc> = row.try_get("first_failed_at")?;
    let last_failed_at: DateTime<Utc> = row.try_get("last_failed_at")?;

    Ok(DeadLetter {
        id: row.try_get("id")?,
        topic: row.try_get("topic")?,
        key: row.try_get("message_key")?,
        action: action
            .parse::<EventAction>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        body: row.try_get("body")?,
        error: row.try_get("error")?,
        attempts: u32::try_from(attempts).unwrap_or_default(),
        source: DeadLetterSource::parse(&source)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown dead letter source {source:?}").into()))?,
        first_failed_at,
        last_failed_at,
    })
}

impl DeadLetterStore for PostgresDeadLetterStore {
    fn park(&self, letter: DeadLetter) -> AsyncResult<(), RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            sqlx::query(
                r#"
                INSERT INTO dead_letters
                    (id, topic, message_key, action, body, error, attempts, source, first_failed_at, last_failed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(letter.id)
            .bind(&letter.topic)
            .bind(&letter.key)
            .bind(letter.action.as_str())
            .bind(&letter.body)
            .bind(&letter.error)
            .bind(i32::try_from(letter.attempts).unwrap_or(i32::MAX))
            .bind(letter.source.as_str())
            .bind(letter.first_failed_at)
            .bind(letter.last_failed_at)
            .execute(&pool)
            .await
            .map_err(map_sqlx)?;
            Ok(())
        })
    }

    fn list(&self, limit: u32) -> AsyncResult<Vec<DeadLetter>, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let rows = sqlx::query(
                r#"
                SELECT id, topic, message_key, action, body, error, attempts, source, first_failed_at, last_failed_at
                FROM dead_letters
                ORDER BY first_failed_at, id
                LIMIT $1
                "#,
            )
            .bind(i64::from(limit))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx)?;
            decoded(rows, dead_letter_from_row)
        })
    }

    fn remove(&self, id: Uuid) -> AsyncResult<bool, RepositoryError> {
        let pool = self.pool.clone();
        AsyncResult::new(async move {
            let result = sqlx::query("DELETE FROM dead_letters WHERE id = $1")
                .bind(id)
                .execute(&pool)
                .await
                .map_err(map_sqlx)?;
            Ok(result.rows_affected() > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_failures_are_connection_errors() {
        assert!(matches!(map_sqlx(sqlx::Error::PoolTimedOut), RepositoryError::Connection { .. }));
        assert!(matches!(map_sqlx(sqlx::Error::RowNotFound), RepositoryError::Query { .. }));
    }

    #[test]
    fn test_schema_allows_one_vet_per_identity() {
        assert!(SCHEMA
            .iter()
            .any(|statement| statement.starts_with("CREATE UNIQUE INDEX") && statement.contains("vets (identity_id)")));
    }

    #[test]
    fn test_page_bounds_are_limit_then_offset() {
        let page = PageRequest::new(2, 10).unwrap();
        assert_eq!(page_bounds(page), (10, 20));
    }
}
