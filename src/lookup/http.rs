use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::domain::shared::{AggregateId, LookupError, OwnerLookup, OwnerProjection};
use crate::reactive::AsyncResult;

// ============================================================================
// Identity service lookup over HTTP
// ============================================================================
//
// GET {base_url}/identities/{id}
//   200       -> Some(projection)
//   404       -> None (resolved empty)
//   other     -> LookupError::Protocol
//   transport -> LookupError::Transport (includes the client timeout)
//
// ============================================================================

#[derive(Clone)]
pub struct HttpOwnerLookup {
    client: reqwest::Client,
    base_url: String,
}

/// The subset of the identity view the projection needs; other fields are
/// ignored.
#[derive(Deserialize)]
struct IdentityView {
    id: AggregateId,
    first_name: String,
    last_name: String,
}

impl HttpOwnerLookup {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, id: AggregateId) -> String {
        format!("{}/identities/{id}", self.base_url)
    }
}

impl OwnerLookup for HttpOwnerLookup {
    fn lookup(&self, id: AggregateId) -> AsyncResult<Option<OwnerProjection>, LookupError> {
        let client = self.client.clone();
        let url = self.url_for(id);

        AsyncResult::new(async move {
            let response = client.get(&url).send().await.map_err(|e| LookupError::Transport {
                message: e.to_string(),
            })?;

            match response.status() {
                StatusCode::OK => {
                    let view: IdentityView = response.json().await.map_err(|e| LookupError::Decode {
                        message: e.to_string(),
                    })?;
                    if view.id != id {
                        return Err(LookupError::Decode {
                            message: format!("asked for identity {id}, response carried {}", view.id),
                        });
                    }
                    tracing::debug!(owner_id = %id, "Owner resolved remotely");
                    Ok::<_, LookupError>(Some(OwnerProjection::new(id, view.first_name, view.last_name)))
                }
                StatusCode::NOT_FOUND => Ok(None),
                other => Err(LookupError::Protocol {
                    status: other.as_u16(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpResponse, HttpServer};

    async fn identity(path: web::Path<String>) -> HttpResponse {
        match path.as_str() {
            "00000000-0000-0000-0000-000000000001" => HttpResponse::Ok().json(serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000001",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "roles": [{ "name": "OWNER" }]
            })),
            "00000000-0000-0000-0000-000000000002" => HttpResponse::NotFound().finish(),
            "00000000-0000-0000-0000-000000000003" => HttpResponse::Ok().body("not json"),
            "00000000-0000-0000-0000-000000000005" => HttpResponse::Ok().json(serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000001",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "roles": []
            })),
            _ => HttpResponse::ServiceUnavailable().finish(),
        }
    }

    fn id(raw: &str) -> AggregateId {
        AggregateId::parse(raw).unwrap()
    }

    #[test]
    fn test_url_ignores_trailing_slash() {
        let lookup = HttpOwnerLookup::new("http://identity:8080/", Duration::from_secs(1)).unwrap();
        let owner = AggregateId::new();
        assert_eq!(lookup.url_for(owner), format!("http://identity:8080/identities/{owner}"));
    }

    #[actix_web::test]
    async fn test_lookup_distinguishes_found_missing_and_failed() {
        let server = HttpServer::new(|| App::new().route("/identities/{id}", web::get().to(identity)))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        let lookup = HttpOwnerLookup::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();

        let found = lookup.lookup(id("00000000-0000-0000-0000-000000000001")).await.unwrap();
        assert_eq!(found.unwrap().display_name(), "Ada Lovelace");

        let missing = lookup.lookup(id("00000000-0000-0000-0000-000000000002")).await;
        assert_eq!(missing, Ok(None));

        let garbled = lookup.lookup(id("00000000-0000-0000-0000-000000000003")).await;
        assert!(matches!(garbled, Err(LookupError::Decode { .. })));

        let outage = lookup.lookup(id("00000000-0000-0000-0000-000000000004")).await;
        assert_eq!(outage, Err(LookupError::Protocol { status: 503 }));

        let someone_else = lookup.lookup(id("00000000-0000-0000-0000-000000000005")).await;
        assert!(matches!(someone_else, Err(LookupError::Decode { .. })));

        handle.stop(false).await;
    }
}
