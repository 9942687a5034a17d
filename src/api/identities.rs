use actix_web::{web, HttpResponse};

use crate::domain::identity::{AssignRole, CreateIdentity, IdentityCommandHandler, UpdateIdentity};

use super::{parse_id, ApiResult, PageQuery};

// POST   /identities
// GET    /identities?page=&size=
// GET    /identities/{id}
// PUT    /identities/{id}
// DELETE /identities/{id}
// POST   /identities/{id}/roles
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/identities")
            .route("", web::post().to(create))
            .route("", web::get().to(list))
            .route("/{id}", web::get().to(get))
            .route("/{id}", web::put().to(update))
            .route("/{id}", web::delete().to(delete))
            .route("/{id}/roles", web::post().to(assign_role)),
    );
}

async fn create(
    handler: web::Data<IdentityCommandHandler>,
    body: web::Json<CreateIdentity>,
) -> ApiResult<HttpResponse> {
    let identity = handler.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(identity))
}

async fn list(handler: web::Data<IdentityCommandHandler>, query: web::Query<PageQuery>) -> ApiResult<HttpResponse> {
    let page = handler.list(query.to_request()?).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn get(handler: web::Data<IdentityCommandHandler>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let identity = handler.get(parse_id(&path)?).await?;
    Ok(HttpResponse::Ok().json(identity))
}

async fn update(
    handler: web::Data<IdentityCommandHandler>,
    path: web::Path<String>,
    body: web::Json<UpdateIdentity>,
) -> ApiResult<HttpResponse> {
    let identity = handler.update(parse_id(&path)?, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(identity))
}

async fn delete(handler: web::Data<IdentityCommandHandler>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    handler.delete(parse_id(&path)?).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn assign_role(
    handler: web::Data<IdentityCommandHandler>,
    path: web::Path<String>,
    body: web::Json<AssignRole>,
) -> ApiResult<HttpResponse> {
    let identity = handler.assign_role(parse_id(&path)?, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    use crate::domain::shared::IDENTITY_TOPIC;
    use crate::messaging::{InMemoryProducer, TopicPublisher};
    use crate::persistence::InMemoryIdentityRepository;

    fn handler(producer: Arc<InMemoryProducer>) -> web::Data<IdentityCommandHandler> {
        web::Data::new(IdentityCommandHandler::new(
            Arc::new(InMemoryIdentityRepository::default()),
            Arc::new(TopicPublisher::new(IDENTITY_TOPIC, producer)),
        ))
    }

    #[actix_web::test]
    async fn test_create_then_assign_duplicate_role_is_conflict() {
        let producer = Arc::new(InMemoryProducer::default());
        let app = test::init_service(
            App::new()
                .app_data(handler(producer.clone()))
                .app_data(crate::api::json_config())
                .configure(configure),
        )
        .await;

        let created: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/identities")
                .set_json(json!({"first_name": "Ada", "last_name": "Byron", "roles": ["owner"]}))
                .to_request(),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/identities/{id}/roles"))
                .set_json(json!({"role": "OWNER"}))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["code"], "already_in_desired_state");
        assert_eq!(producer.sent().await.len(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_identity_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(handler(Arc::new(InMemoryProducer::default())))
                .configure(configure),
        )
        .await;

        let uri = format!("/identities/{}", crate::domain::shared::AggregateId::new());
        let response = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = test::call_service(&app, test::TestRequest::delete().uri(&uri).to_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(handler(Arc::new(InMemoryProducer::default())))
                .app_data(crate::api::json_config())
                .configure(configure),
        )
        .await;

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/identities")
                .insert_header(("content-type", "application/json"))
                .set_payload("{\"first_name\":")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_list_pages_with_total() {
        let app = test::init_service(
            App::new()
                .app_data(handler(Arc::new(InMemoryProducer::default())))
                .configure(configure),
        )
        .await;

        for name in ["Ada", "Grace", "Edsger"] {
            let response = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/identities")
                    .set_json(json!({"first_name": name, "last_name": "Test"}))
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let page: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/identities?page=1&size=2").to_request(),
        )
        .await;
        assert_eq!(page["total"], 3);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["first_name"], "Edsger");
    }
}
