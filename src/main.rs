//! Try-On Compositor
//!
//! Virtual garment try-on service using Rust + Actix-Web.
//! Scales a garment image onto a user photo with a deterministic layout rule
//! and forwards assistant chat prompts to a generative-language API.

use actix_web::{web, App, HttpServer, middleware};
use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use std::sync::Arc;

mod api;
mod domain;
mod engine;
mod config;
mod providers;
mod storage;

use crate::config::Settings;
use crate::providers::{AssistantProvider, GeminiProvider, ProviderError};
use crate::storage::UploadStore;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub upload_store: Arc<dyn UploadStore>,
    pub assistant: Option<Arc<dyn AssistantProvider>>,
    pub started_at: DateTime<Utc>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tryon_compositor=info".parse()?)
                .add_directive("actix_web=info".parse()?)
        )
        .json()
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting Try-On Compositor v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    let upload_store = storage::build_store(settings.uploads.strategy, &settings.uploads.dir)
        .await
        .context("Failed to initialize upload store")?;
    info!(store = upload_store.kind(), "Upload store ready");

    let assistant: Option<Arc<dyn AssistantProvider>> = match GeminiProvider::new(&settings.assistant) {
        Ok(provider) => {
            info!(model = %provider.model(), "Assistant provider configured");
            Some(Arc::new(provider))
        }
        Err(ProviderError::NotConfigured(reason)) => {
            info!(reason = %reason, "Assistant disabled, chat endpoint will answer 503");
            None
        }
        Err(e) => {
            warn!(error = %e, "Failed to create assistant provider. Running without chat.");
            None
        }
    };

    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState {
        settings,
        upload_store,
        assistant,
        started_at: Utc::now(),
    });

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "tryon-compositor"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION")))
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    Ok(())
}
