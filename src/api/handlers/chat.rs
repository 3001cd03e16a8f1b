//! Assistant chat endpoint
//!
//! Forwards a single prompt to the configured generative-language provider.
//! No conversation history is kept server-side.

use actix_web::{http::StatusCode, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::AppState;
use crate::providers::ProviderError;
use super::tryon::{error_response, ErrorResponse};

/// Longest prompt forwarded upstream, in characters
const MAX_PROMPT_CHARS: usize = 8_000;

/// Request body for chat
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub prompt: String,
}

/// Response for a successful chat turn
#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
}

/// POST /api/v1/chat - Forward a prompt to the assistant
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "assistant",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant replied", body = ChatResponse),
        (status = 400, description = "Empty or oversized prompt", body = ErrorResponse),
        (status = 502, description = "Upstream provider failed", body = ErrorResponse),
        (status = 503, description = "Assistant not configured", body = ErrorResponse)
    )
)]
pub async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> HttpResponse {
    let Some(provider) = state.assistant.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "ASSISTANT_UNAVAILABLE",
            "No assistant API key configured".to_string(),
        );
    };

    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "INVALID_PROMPT", "Prompt must not be empty".to_string());
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_PROMPT",
            format!("Prompt exceeds {} characters", MAX_PROMPT_CHARS),
        );
    }

    info!(provider = provider.name(), model = %provider.model(), "Forwarding chat prompt");

    match provider.generate(prompt).await {
        Ok(response) => HttpResponse::Ok().json(ChatResponse {
            success: true,
            response,
        }),
        Err(e) => {
            error!(provider = provider.name(), error = %e, "Assistant API error");
            let status = match e {
                ProviderError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            };
            error_response(status, "ASSISTANT_FAILED", e.to_string())
        }
    }
}
