use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::shared::{AggregateId, CacheError, OwnerProjection};
use crate::reactive::AsyncResult;

use super::store::ProjectionStore;

const KEY_PREFIX: &str = "owner-projection";

/// Redis-backed projection store. Values are JSON, written without expiry.
#[derive(Clone)]
pub struct RedisProjectionStore {
    connection: MultiplexedConnection,
}

impl RedisProjectionStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        tracing::info!("🗄️ Connected to Redis projection store");
        Ok(Self { connection })
    }

    fn key(id: AggregateId) -> String {
        format!("{KEY_PREFIX}:{id}")
    }
}

fn unavailable(error: redis::RedisError) -> CacheError {
    CacheError::Unavailable {
        message: error.to_string(),
    }
}

impl ProjectionStore for RedisProjectionStore {
    fn get(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, CacheError> {
        let mut connection = self.connection.clone();
        AsyncResult::new(async move {
            let raw: Option<String> = connection.get(Self::key(id)).await.map_err(unavailable)?;
            raw.map(|json| {
                serde_json::from_str(&json).map_err(|e| CacheError::Corrupt {
                    message: format!("{}: {e}", Self::key(id)),
                })
            })
            .transpose()
        })
    }

    fn put(&self, projection: OwnerProjection) -> AsyncResult<(), CacheError> {
        let mut connection = self.connection.clone();
        AsyncResult::new(async move {
            let json = serde_json::to_string(&projection).map_err(|e| CacheError::Corrupt {
                message: e.to_string(),
            })?;
            connection
                .set::<_, _, ()>(Self::key(projection.id), json)
                .await
                .map_err(unavailable)
        })
    }

    fn remove(&self, id: AggregateId) -> AsyncResult<(), CacheError> {
        let mut connection = self.connection.clone();
        AsyncResult::new(async move { connection.del::<_, ()>(Self::key(id)).await.map_err(unavailable) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = AggregateId::new();
        assert_eq!(RedisProjectionStore::key(id), format!("owner-projection:{id}"));
    }
}
