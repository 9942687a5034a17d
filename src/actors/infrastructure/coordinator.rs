use std::time::Duration;

use actix::prelude::*;
use tokio::task::JoinHandle;

use crate::actors::core::HealthStatus;
use crate::messaging::KafkaChoreographyConsumer;
use crate::utils::{BreakerState, CircuitBreaker};

use super::{GetSystemHealth, HealthMonitorActor, UpdateHealth};

// ============================================================================
// Coordinator Actor - supervises the choreography consumers
// ============================================================================
//
// Responsibilities:
// - Start one task per subscribed topic
// - Report the producer's circuit breaker to the health monitor
// - Log overall health periodically
// - Stop the consumer tasks on shutdown
//
// ============================================================================

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

pub struct CoordinatorActor {
    health_monitor: Addr<HealthMonitorActor>,
    consumers: Vec<KafkaChoreographyConsumer>,
    producer_breaker: Option<CircuitBreaker>,
    probe_interval: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorActor {
    pub fn new(health_monitor: Addr<HealthMonitorActor>) -> Self {
        Self {
            health_monitor,
            consumers: Vec::new(),
            producer_breaker: None,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            tasks: Vec::new(),
        }
    }

    pub fn with_consumer(mut self, consumer: KafkaChoreographyConsumer) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn with_producer_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.producer_breaker = Some(breaker);
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    fn start_consumers(&mut self) {
        for consumer in std::mem::take(&mut self.consumers) {
            tracing::info!(topic = %consumer.topic(), "Starting choreography consumer");
            let health = self.health_monitor.clone().recipient();
            self.tasks.push(actix::spawn(consumer.run(health)));
        }
    }

    fn watch_breaker(&self, ctx: &mut Context<Self>) {
        let Some(breaker) = self.producer_breaker.clone() else {
            return;
        };

        ctx.run_interval(self.probe_interval, move |act, _ctx| {
            let breaker = breaker.clone();
            let health_monitor = act.health_monitor.clone();
            actix::spawn(async move {
                let state = breaker.state().await;
                health_monitor.do_send(UpdateHealth {
                    component: breaker.name().to_string(),
                    status: breaker_health(state),
                    details: None,
                });
            });
        });
    }

    fn stop_consumers(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn breaker_health(state: BreakerState) -> HealthStatus {
    match state {
        BreakerState::Closed => HealthStatus::Healthy,
        BreakerState::HalfOpen => HealthStatus::Degraded("circuit breaker half-open".to_string()),
        BreakerState::Open => HealthStatus::Unhealthy("circuit breaker open".to_string()),
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("🎯 CoordinatorActor started");
        self.start_consumers();
        self.watch_breaker(ctx);

        ctx.run_interval(HEALTH_LOG_INTERVAL, |act, _ctx| {
            let health_monitor = act.health_monitor.clone();
            actix::spawn(async move {
                match health_monitor.send(GetSystemHealth).await {
                    Ok(health) => match health.overall_status {
                        HealthStatus::Healthy => tracing::debug!("System health check: Healthy"),
                        HealthStatus::Degraded(ref reason) => {
                            tracing::warn!(reason = %reason, "System health check: Degraded")
                        }
                        HealthStatus::Unhealthy(ref reason) => {
                            tracing::error!(reason = %reason, "System health check: Unhealthy")
                        }
                    },
                    Err(e) => tracing::error!(error = %e, "Failed to get system health"),
                }
            });
        });
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        tracing::info!("🛑 CoordinatorActor stopping");
        self.stop_consumers();
        Running::Stop
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        tracing::info!(tasks = self.tasks.len(), "Received shutdown signal");
        self.stop_consumers();
        ctx.stop();
    }
}
