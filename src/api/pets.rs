use actix_web::{web, HttpResponse};

use crate::domain::pet::{AdoptPet, CreatePet, PetCommandHandler};

use super::{parse_id, ApiResult, PageQuery};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/pets")
            .route("", web::post().to(create))
            .route("", web::get().to(search))
            .route("/{id}/owner", web::put().to(adopt))
            .route("/{id}", web::delete().to(delete)),
    );
}

async fn create(handler: web::Data<PetCommandHandler>, body: web::Json<CreatePet>) -> ApiResult<HttpResponse> {
    let details = handler.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(details))
}

async fn search(handler: web::Data<PetCommandHandler>, query: web::Query<PageQuery>) -> ApiResult<HttpResponse> {
    let page = handler.search(query.to_request()?).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn adopt(
    handler: web::Data<PetCommandHandler>,
    path: web::Path<String>,
    body: web::Json<AdoptPet>,
) -> ApiResult<HttpResponse> {
    let details = handler.adopt(parse_id(&path)?, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(details))
}

async fn delete(handler: web::Data<PetCommandHandler>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    handler.delete(parse_id(&path)?).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    use crate::cache::{InMemoryProjectionStore, OwnerResolutionCache};
    use crate::domain::shared::{AggregateId, LookupError, MockOwnerLookup, OwnerProjection, PET_TOPIC};
    use crate::messaging::{InMemoryProducer, TopicPublisher};
    use crate::persistence::InMemoryPetRepository;
    use crate::reactive::AsyncResult;

    fn handler(lookup: MockOwnerLookup) -> web::Data<PetCommandHandler> {
        let owners = OwnerResolutionCache::new(Arc::new(InMemoryProjectionStore::default()), Arc::new(lookup));
        web::Data::new(PetCommandHandler::new(
            Arc::new(InMemoryPetRepository::default()),
            Arc::new(TopicPublisher::new(PET_TOPIC, Arc::new(InMemoryProducer::default()))),
            owners,
        ))
    }

    #[actix_web::test]
    async fn test_unknown_owner_is_bad_request() {
        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().returning(|_| AsyncResult::succeeded(None));
        let app = test::init_service(App::new().app_data(handler(lookup)).configure(configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/pets")
                .set_json(json!({"name": "Leo", "species": "cat", "owner_id": AggregateId::new()}))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["code"], "reference_not_found");
    }

    #[actix_web::test]
    async fn test_owner_service_outage_is_bad_gateway() {
        let mut lookup = MockOwnerLookup::new();
        lookup.expect_lookup().returning(|_| {
            AsyncResult::error(LookupError::Transport {
                message: "connection refused".to_string(),
            })
        });
        let app = test::init_service(App::new().app_data(handler(lookup)).configure(configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/pets")
                .set_json(json!({"name": "Leo", "species": "cat", "owner_id": AggregateId::new()}))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_adopt_then_search_embeds_owner() {
        let mut lookup = MockOwnerLookup::new();
        lookup
            .expect_lookup()
            .returning(|id| AsyncResult::succeeded(Some(OwnerProjection::new(id, "Jean", "Coleman"))));
        let app = test::init_service(App::new().app_data(handler(lookup)).configure(configure)).await;

        let created: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/pets")
                .set_json(json!({"name": "Max", "species": "Dog"}))
                .to_request(),
        )
        .await;
        assert_eq!(created["species"], "dog");
        assert!(created["owner"].is_null());

        let owner_id = AggregateId::new();
        let pet_id = created["id"].as_str().unwrap().to_string();
        let adopt = || {
            test::TestRequest::put()
                .uri(&format!("/pets/{pet_id}/owner"))
                .set_json(json!({"owner_id": owner_id}))
                .to_request()
        };

        let response = test::call_service(&app, adopt()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = test::call_service(&app, adopt()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let page: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/pets").to_request()).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["owner"]["last_name"], "Coleman");
    }
}
