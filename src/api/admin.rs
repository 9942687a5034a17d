use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::domain::shared::DomainError;
use crate::messaging::{replay_dead_letters, DeadLetterStore, MessageProducer};

use super::ApiResult;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

/// Dead letters and the raw producer used to re-send them.
#[derive(Clone)]
pub struct AdminState {
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub producer: Arc<dyn MessageProducer>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

impl LimitQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

// GET  /admin/dead-letters?limit=
// POST /admin/dead-letters/replay?limit=
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/dead-letters")
            .route("", web::get().to(list))
            .route("/replay", web::post().to(replay)),
    );
}

async fn list(state: web::Data<AdminState>, query: web::Query<LimitQuery>) -> ApiResult<HttpResponse> {
    let letters = state.dead_letters.list(query.limit()).await.map_err(DomainError::from)?;
    Ok(HttpResponse::Ok().json(letters))
}

async fn replay(state: web::Data<AdminState>, query: web::Query<LimitQuery>) -> ApiResult<HttpResponse> {
    let report = replay_dead_letters(state.dead_letters.as_ref(), state.producer.as_ref(), query.limit())
        .await
        .map_err(DomainError::from)?;
    tracing::info!(delivered = report.delivered, failed = report.failed, "Dead letter replay finished");
    Ok(HttpResponse::Ok().json(report))
}
