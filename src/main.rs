use std::sync::Arc;

use actix::prelude::*;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use petclinic_choreography::actors::{CoordinatorActor, HealthMonitorActor, Shutdown};
use petclinic_choreography::api::{self, AdminState};
use petclinic_choreography::cache::{InMemoryProjectionStore, OwnerResolutionCache, ProjectionStore, RedisProjectionStore};
use petclinic_choreography::config::{ServiceRole, Settings};
use petclinic_choreography::domain::identity::{IdentityCommandHandler, IdentityRepository};
use petclinic_choreography::domain::pet::{PetCommandHandler, PetRepository};
use petclinic_choreography::domain::shared::CascadeOnRemoteDelete;
use petclinic_choreography::domain::vet::{VetCommandHandler, VetRepository};
use petclinic_choreography::lookup::HttpOwnerLookup;
use petclinic_choreography::messaging::{
    ConsumerSettings, DeadLetterStore, DeleteChoreography, KafkaChoreographyConsumer, KafkaProducer, LoggingProducer,
    MessageProducer, TopicPublisher,
};
use petclinic_choreography::metrics::{self, Metrics};
use petclinic_choreography::persistence::{
    ensure_schema, InMemoryDeadLetterStore, InMemoryIdentityRepository, InMemoryPetRepository, InMemoryVetRepository,
    PostgresDeadLetterStore, PostgresIdentityRepository, PostgresPetRepository, PostgresVetRepository,
};
use petclinic_choreography::telemetry;

/// Routes of the role this process runs.
#[derive(Clone)]
enum RoleRoutes {
    Identity(web::Data<IdentityCommandHandler>),
    Pet(web::Data<PetCommandHandler>),
    Vet(web::Data<VetCommandHandler>),
}

impl RoleRoutes {
    fn mount(&self, cfg: &mut web::ServiceConfig) {
        match self {
            RoleRoutes::Identity(handler) => {
                cfg.app_data(handler.clone());
                api::configure_identities(cfg);
            }
            RoleRoutes::Pet(handler) => {
                cfg.app_data(handler.clone());
                api::configure_pets(cfg);
            }
            RoleRoutes::Vet(handler) => {
                cfg.app_data(handler.clone());
                api::configure_vets(cfg);
            }
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let settings = Settings::parse();

    tracing::info!(role = settings.role.as_str(), "🚀 Starting pet clinic service");

    // === 1. Metrics and health ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());
    let health_monitor = HealthMonitorActor::new().start();

    // === 2. Storage ===
    let pool = match &settings.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            ensure_schema(&pool).await?;
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory repositories");
            None
        }
    };

    let dead_letters: Arc<dyn DeadLetterStore> = match &pool {
        Some(pool) => Arc::new(PostgresDeadLetterStore::new(pool.clone())),
        None => Arc::new(InMemoryDeadLetterStore::default()),
    };

    // === 3. Broker ===
    let mut coordinator = CoordinatorActor::new(health_monitor.clone());
    let producer: Arc<dyn MessageProducer> = match &settings.kafka_brokers {
        Some(brokers) => {
            let producer = KafkaProducer::new(brokers)?;
            coordinator = coordinator.with_producer_breaker(producer.circuit_breaker());
            Arc::new(producer)
        }
        None => {
            tracing::warn!("KAFKA_BROKERS not set, events are logged and dropped and nothing is consumed");
            Arc::new(LoggingProducer)
        }
    };

    let publisher = TopicPublisher::new(settings.role.publishes_to(), producer.clone())
        .with_dead_letters(dead_letters.clone())
        .with_metrics(metrics.clone());

    // === 4. Role wiring ===
    let routes = match settings.role {
        ServiceRole::Identity => {
            let repository: Arc<dyn IdentityRepository> = match &pool {
                Some(pool) => Arc::new(PostgresIdentityRepository::new(pool.clone())),
                None => Arc::new(InMemoryIdentityRepository::default()),
            };
            RoleRoutes::Identity(web::Data::new(IdentityCommandHandler::new(repository, Arc::new(publisher))))
        }
        ServiceRole::Pet => {
            let repository: Arc<dyn PetRepository> = match &pool {
                Some(pool) => Arc::new(PostgresPetRepository::new(pool.clone())),
                None => Arc::new(InMemoryPetRepository::default()),
            };
            let owners = owner_cache(&settings, metrics.clone()).await?;
            let handler = Arc::new(PetCommandHandler::new(repository, Arc::new(publisher), owners.clone()));
            coordinator = subscribe(coordinator, &settings, handler.clone(), owners, &metrics, &dead_letters)?;
            RoleRoutes::Pet(web::Data::from(handler))
        }
        ServiceRole::Vet => {
            let repository: Arc<dyn VetRepository> = match &pool {
                Some(pool) => Arc::new(PostgresVetRepository::new(pool.clone())),
                None => Arc::new(InMemoryVetRepository::default()),
            };
            let identities = owner_cache(&settings, metrics.clone()).await?;
            let handler = Arc::new(VetCommandHandler::new(repository, Arc::new(publisher), identities.clone()));
            coordinator = subscribe(coordinator, &settings, handler.clone(), identities, &metrics, &dead_letters)?;
            RoleRoutes::Vet(web::Data::from(handler))
        }
    };

    // === 5. Consumers under supervision ===
    let coordinator = coordinator.start();

    // === 6. Servers ===
    let admin = web::Data::new(AdminState {
        dead_letters,
        producer,
    });

    tracing::info!(addr = %settings.http_addr, "🌐 Starting HTTP server");
    let http = HttpServer::new(move || {
        let routes = routes.clone();
        App::new()
            .app_data(api::json_config())
            .app_data(api::query_config())
            .app_data(admin.clone())
            .configure(api::configure_admin)
            .configure(move |cfg| routes.mount(cfg))
    })
    .bind(settings.http_addr)?
    .run();

    let metrics_server =
        metrics::start_metrics_server(metrics.registry().clone(), settings.metrics_port, health_monitor.clone());

    tokio::select! {
        result = http => result?,
        result = metrics_server => result?,
    }

    tracing::info!("🛑 Shutting down");
    coordinator.send(Shutdown).await?;

    Ok(())
}

async fn owner_cache(settings: &Settings, metrics: Arc<Metrics>) -> anyhow::Result<OwnerResolutionCache> {
    let store: Arc<dyn ProjectionStore> = match &settings.redis_url {
        Some(url) => Arc::new(RedisProjectionStore::connect(url).await?),
        None => Arc::new(InMemoryProjectionStore::default()),
    };
    let lookup = HttpOwnerLookup::new(&settings.identity_service_url, settings.lookup_timeout())?;
    Ok(OwnerResolutionCache::new(store, Arc::new(lookup)).with_metrics(metrics))
}

/// Attach the identity DELETE consumer when a broker is configured.
fn subscribe(
    coordinator: CoordinatorActor,
    settings: &Settings,
    cascade: Arc<dyn CascadeOnRemoteDelete>,
    cache: OwnerResolutionCache,
    metrics: &Arc<Metrics>,
    dead_letters: &Arc<dyn DeadLetterStore>,
) -> anyhow::Result<CoordinatorActor> {
    let (Some(brokers), Some(topic)) = (&settings.kafka_brokers, settings.role.consumes()) else {
        return Ok(coordinator);
    };

    let choreography = DeleteChoreography::new(topic, cascade)
        .with_cache(cache)
        .with_metrics(metrics.clone());

    let consumer_settings = ConsumerSettings {
        brokers: brokers.clone(),
        group_id: settings.group_id(),
        max_attempts: settings.consumer_max_attempts,
        backoff: settings.consumer_backoff(),
    };

    let consumer = KafkaChoreographyConsumer::new(&consumer_settings, Arc::new(choreography))?
        .with_dead_letters(dead_letters.clone())
        .with_metrics(metrics.clone());

    Ok(coordinator.with_consumer(consumer))
}
