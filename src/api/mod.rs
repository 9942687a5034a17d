// ============================================================================
// HTTP boundary
// ============================================================================
//
// Thin actix-web adapters over the command handlers. Each service role
// mounts only its own routes plus the admin routes.
//
// ============================================================================

mod admin;
mod error;
mod identities;
mod pets;
mod vets;

use actix_web::web;
use serde::Deserialize;

use crate::domain::shared::{AggregateId, PageRequest, DEFAULT_PAGE_SIZE};

pub use admin::{configure as configure_admin, AdminState};
pub use error::{ApiError, ApiResult};
pub use identities::configure as configure_identities;
pub use pets::configure as configure_pets;
pub use vets::configure as configure_vets;

/// `?page=&size=` with the defaults of `PageRequest`.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> ApiResult<PageRequest> {
        Ok(PageRequest::new(
            self.page.unwrap_or(0),
            self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )?)
    }
}

pub(crate) fn parse_id(raw: &str) -> ApiResult<AggregateId> {
    AggregateId::parse(raw).map_err(|e| ApiError::invalid(e.to_string()))
}

/// Malformed JSON bodies are a 400 with the usual error body.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ApiError::invalid(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ApiError::invalid(err.to_string()).into())
}
