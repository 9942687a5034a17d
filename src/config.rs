use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::domain::shared::{IDENTITY_TOPIC, PET_TOPIC, VET_TOPIC};

// ============================================================================
// Service configuration
// ============================================================================
//
// Every setting can come from a flag or the environment. Optional backends
// fall back to in-process adapters, so a single role runs with no
// infrastructure at all.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceRole {
    Identity,
    Pet,
    Vet,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Identity => "identity",
            ServiceRole::Pet => "pet",
            ServiceRole::Vet => "vet",
        }
    }

    /// Topic this role announces its own aggregate on.
    pub fn publishes_to(&self) -> &'static str {
        match self {
            ServiceRole::Identity => IDENTITY_TOPIC,
            ServiceRole::Pet => PET_TOPIC,
            ServiceRole::Vet => VET_TOPIC,
        }
    }

    /// Topic whose DELETEs this role cascades, if any.
    pub fn consumes(&self) -> Option<&'static str> {
        match self {
            ServiceRole::Identity => None,
            ServiceRole::Pet | ServiceRole::Vet => Some(IDENTITY_TOPIC),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "petclinic-choreography", about = "Identity / pet / vet choreography service")]
pub struct Settings {
    /// Which service this process runs
    #[arg(long, env = "SERVICE_ROLE", value_enum)]
    pub role: ServiceRole,

    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Kafka bootstrap servers; events stay in process when unset
    #[arg(long, env = "KAFKA_BROKERS")]
    pub kafka_brokers: Option<String>,

    /// Consumer group; defaults to `<role>-service`
    #[arg(long, env = "KAFKA_GROUP_ID")]
    pub kafka_group_id: Option<String>,

    /// PostgreSQL connection string; in-memory repositories when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis connection string for the owner cache; in-memory when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "IDENTITY_SERVICE_URL", default_value = "http://localhost:8080")]
    pub identity_service_url: String,

    #[arg(long, env = "LOOKUP_TIMEOUT_MS", default_value_t = 2_000)]
    pub lookup_timeout_ms: u64,

    #[arg(long, env = "CONSUMER_MAX_ATTEMPTS", default_value_t = 5)]
    pub consumer_max_attempts: u32,

    #[arg(long, env = "CONSUMER_BACKOFF_MS", default_value_t = 500)]
    pub consumer_backoff_ms: u64,
}

impl Settings {
    pub fn group_id(&self) -> String {
        self.kafka_group_id
            .clone()
            .unwrap_or_else(|| format!("{}-service", self.role.as_str()))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn consumer_backoff(&self) -> Duration {
        Duration::from_millis(self.consumer_backoff_ms)
    }
}
