//! API module - HTTP routes and handlers

pub mod handlers;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Resources answer 405 for methods they have no route for
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/tryon").route(web::post().to(handlers::tryon::tryon)))
            .service(web::resource("/tryon/layout").route(web::post().to(handlers::tryon::preview_layout)))
            .service(web::resource("/chat").route(web::post().to(handlers::chat::chat)))
    )
    .service(web::resource("/health").route(web::get().to(handlers::health::health_check)))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}
