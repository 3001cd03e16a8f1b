//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    health::HealthResponse,
    tryon::{
        TryOnForm, TryOnResponse, TryOnMetadata, Dimensions,
        LayoutPreviewRequest, LayoutPreviewResponse, ErrorResponse, ApiError,
    },
    chat::{ChatRequest, ChatResponse},
};
use crate::domain::{GarmentPreset, HorizontalAlign, LayoutConfig, LayoutRect};
use crate::engine::{OutputEncoding, OutputFormat};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Try-On Compositor API",
        version = "0.1.0",
        description = "Virtual garment try-on compositing and assistant chat forwarding",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "tryon", description = "Garment layout and compositing endpoints"),
        (name = "assistant", description = "Assistant chat forwarding")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::tryon::tryon,
        crate::api::handlers::tryon::preview_layout,
        crate::api::handlers::chat::chat,
    ),
    components(
        schemas(
            // Health schemas
            HealthResponse,
            // Try-on schemas
            TryOnForm,
            TryOnResponse,
            TryOnMetadata,
            Dimensions,
            LayoutPreviewRequest,
            LayoutPreviewResponse,
            ErrorResponse,
            ApiError,
            // Chat schemas
            ChatRequest,
            ChatResponse,
            // Domain schemas
            LayoutConfig,
            LayoutRect,
            GarmentPreset,
            HorizontalAlign,
            OutputFormat,
            OutputEncoding,
        )
    )
)]
pub struct ApiDoc;
