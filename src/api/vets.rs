use actix_web::{web, HttpResponse};

use crate::domain::vet::{CreateVet, UpdateSpecialities, VetCommandHandler};

use super::{parse_id, ApiResult, PageQuery};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vets")
            .route("", web::post().to(create))
            .route("", web::get().to(search))
            .route("/{id}/specialities", web::put().to(update_specialities))
            .route("/{id}", web::delete().to(delete)),
    );
}

async fn create(handler: web::Data<VetCommandHandler>, body: web::Json<CreateVet>) -> ApiResult<HttpResponse> {
    let details = handler.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(details))
}

async fn search(handler: web::Data<VetCommandHandler>, query: web::Query<PageQuery>) -> ApiResult<HttpResponse> {
    let page = handler.search(query.to_request()?).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn update_specialities(
    handler: web::Data<VetCommandHandler>,
    path: web::Path<String>,
    body: web::Json<UpdateSpecialities>,
) -> ApiResult<HttpResponse> {
    let vet = handler.update_specialities(parse_id(&path)?, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(vet))
}

async fn delete(handler: web::Data<VetCommandHandler>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    handler.delete(parse_id(&path)?).await?;
    Ok(HttpResponse::NoContent().finish())
}
