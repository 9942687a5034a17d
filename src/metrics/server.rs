use actix::Addr;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};

use crate::actors::{GetSystemHealth, HealthMonitorActor, HealthStatus};

/// Serve `/metrics` and `/health` until the server is stopped.
pub async fn start_metrics_server(
    registry: Registry,
    port: u16,
    health_monitor: Addr<HealthMonitorActor>,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(health_monitor.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(registry: web::Data<Registry>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

async fn health_handler(health_monitor: web::Data<Addr<HealthMonitorActor>>) -> impl Responder {
    match health_monitor.send(GetSystemHealth).await {
        Ok(health) if health.overall_status.is_unhealthy() => HttpResponse::ServiceUnavailable().json(health),
        Ok(health) => HttpResponse::Ok().json(health),
        Err(e) => {
            tracing::error!(error = %e, "Health monitor unreachable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "overall_status": HealthStatus::Unhealthy(e.to_string()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::UpdateHealth;
    use actix::Actor;
    use actix_web::test;

    #[actix_web::test]
    async fn test_health_reports_unhealthy_components() {
        let monitor = HealthMonitorActor::new().start();
        monitor.do_send(UpdateHealth {
            component: "kafka_producer".to_string(),
            status: HealthStatus::Unhealthy("circuit breaker open".to_string()),
            details: None,
        });

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(monitor))
                .route("/health", web::get().to(health_handler)),
        )
        .await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["overall_status"]["state"], "unhealthy");
    }

    #[actix_web::test]
    async fn test_metrics_are_exposed_as_text() {
        let metrics = crate::metrics::Metrics::new().unwrap();
        metrics.record_published("pet", "CREATE");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(metrics.registry().clone()))
                .route("/metrics", web::get().to(metrics_handler)),
        )
        .await;

        let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("events_published_total"));
    }
}
