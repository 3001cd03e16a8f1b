//! Virtual try-on endpoints

use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpResponse};
use bytes::BytesMut;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use crate::AppState;
use crate::domain::{compute_layout, CompositeError, GarmentPreset, LayoutConfig, LayoutRect};
use crate::engine::{codec, composite, CodecError, OutputEncoding, OutputFormat};
use crate::storage::{UploadError, UploadHandle, UploadStore};

/// Multipart field carrying the user photo
const BASE_FIELD: &str = "images";
/// Multipart field carrying the garment image
const GARMENT_FIELD: &str = "garment";
/// Text fields the handler understands; any other field is drained and ignored
const OPTION_FIELDS: [&str; 5] = ["preset", "width_fraction", "vertical_offset_fraction", "format", "encoding"];
/// Option values are small; anything bigger is not a valid option
const MAX_OPTION_BYTES: usize = 256;
/// Placement header on raw-bytes responses, formatted `x,y,width,height`
const LAYOUT_HEADER: &str = "X-Layout-Rect";

/// Try-on processing errors
#[derive(Debug, Error)]
pub enum TryOnError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error("Invalid layout option: {0}")]
    InvalidOption(String),
    #[error("Image worker failed: {0}")]
    Worker(String),
}

impl TryOnError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            TryOnError::Upload(UploadError::Io(_) | UploadError::NotFound(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPLOAD_FAILED")
            }
            TryOnError::Upload(UploadError::TooLarge { .. }) => (StatusCode::PAYLOAD_TOO_LARGE, "UPLOAD_TOO_LARGE"),
            TryOnError::Upload(_) => (StatusCode::BAD_REQUEST, "UPLOAD_FAILED"),
            TryOnError::Codec(CodecError::Decode(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_FAILED"),
            TryOnError::Codec(CodecError::Encode(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODE_FAILED"),
            TryOnError::Composite(e) if e.is_config() => (StatusCode::BAD_REQUEST, "INVALID_LAYOUT"),
            TryOnError::Composite(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
            TryOnError::InvalidOption(_) => (StatusCode::BAD_REQUEST, "INVALID_LAYOUT"),
            TryOnError::Worker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_FAILED"),
        }
    }

    fn into_response(self) -> HttpResponse {
        let (status, code) = self.status_and_code();
        error_response(status, code, self.to_string())
    }
}

/// Multipart form accepted by the try-on endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct TryOnForm {
    /// User photo (base image)
    #[schema(value_type = String, format = Binary)]
    pub images: Vec<u8>,
    /// Garment image (overlay)
    #[schema(value_type = String, format = Binary)]
    pub garment: Vec<u8>,
    /// Named layout; defaults to the configured preset
    pub preset: Option<GarmentPreset>,
    /// Overrides the preset's width fraction
    pub width_fraction: Option<f64>,
    /// Overrides the preset's vertical offset fraction
    pub vertical_offset_fraction: Option<f64>,
    /// Output format; defaults to the configured format
    pub format: Option<OutputFormat>,
    /// `data_url` (JSON response, default) or `bytes` (image body)
    pub encoding: Option<OutputEncoding>,
}

/// Response for a successful try-on
#[derive(Serialize, ToSchema)]
pub struct TryOnResponse {
    pub success: bool,
    /// Composited image as a data URL
    pub preview: String,
    pub layout: LayoutRect,
    pub metadata: TryOnMetadata,
}

#[derive(Serialize, ToSchema)]
pub struct TryOnMetadata {
    pub processing_time_ms: u64,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Request body for layout preview
#[derive(Debug, Deserialize, ToSchema)]
pub struct LayoutPreviewRequest {
    pub base: Dimensions,
    pub overlay: Dimensions,
    /// Named layout, ignored when `config` is given
    #[serde(default)]
    pub preset: Option<GarmentPreset>,
    /// Explicit layout configuration
    #[serde(default)]
    pub config: Option<LayoutConfig>,
}

#[derive(Serialize, ToSchema)]
pub struct LayoutPreviewResponse {
    pub success: bool,
    pub config: LayoutConfig,
    pub layout: LayoutRect,
}

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

pub(crate) fn error_response(status: StatusCode, code: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message,
        },
    })
}

/// Layout options collected from multipart text fields
#[derive(Debug, Default)]
struct LayoutOptions {
    preset: Option<GarmentPreset>,
    width_fraction: Option<f64>,
    vertical_offset_fraction: Option<f64>,
    format: Option<OutputFormat>,
    encoding: Option<OutputEncoding>,
}

impl LayoutOptions {
    fn set(&mut self, name: &str, value: &str) -> Result<(), TryOnError> {
        let value = value.trim();
        match name {
            "preset" => self.preset = Some(value.parse().map_err(TryOnError::InvalidOption)?),
            "format" => self.format = Some(value.parse().map_err(TryOnError::InvalidOption)?),
            "encoding" => self.encoding = Some(value.parse().map_err(TryOnError::InvalidOption)?),
            "width_fraction" => self.width_fraction = Some(parse_fraction(name, value)?),
            "vertical_offset_fraction" => self.vertical_offset_fraction = Some(parse_fraction(name, value)?),
            _ => return Err(TryOnError::InvalidOption(format!("Unknown option '{}'", name))),
        }
        Ok(())
    }

    /// Resolve against the configured default preset
    fn resolve(&self, default_preset: GarmentPreset) -> LayoutConfig {
        let mut config = self.preset.unwrap_or(default_preset).config();
        if let Some(f) = self.width_fraction {
            config.width_fraction = f;
        }
        if let Some(v) = self.vertical_offset_fraction {
            config.vertical_offset_fraction = v;
        }
        config
    }
}

fn parse_fraction(name: &str, value: &str) -> Result<f64, TryOnError> {
    value
        .parse::<f64>()
        .map_err(|_| TryOnError::InvalidOption(format!("{} must be a number, got '{}'", name, value)))
}

/// Uploaded images stashed in the upload store
#[derive(Default)]
struct StashedUploads {
    base: Option<UploadHandle>,
    garment: Option<UploadHandle>,
}

impl StashedUploads {
    async fn discard(self, store: &dyn UploadStore) {
        for handle in [self.base, self.garment].into_iter().flatten() {
            store.discard(handle).await;
        }
    }
}

/// Read one multipart field into memory, refusing anything over `limit`
async fn read_field(field: &mut actix_multipart::Field, limit: usize) -> Result<BytesMut, UploadError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(UploadError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Consume a field without keeping its contents
async fn drain_field(field: &mut actix_multipart::Field) -> Result<usize, UploadError> {
    let mut total = 0;
    while let Some(chunk) = field.next().await {
        total += chunk.map_err(|e| UploadError::Multipart(e.to_string()))?.len();
    }
    Ok(total)
}

async fn receive_uploads(
    payload: &mut Multipart,
    store: &dyn UploadStore,
    stashed: &mut StashedUploads,
    max_bytes: usize,
) -> Result<LayoutOptions, TryOnError> {
    let mut options = LayoutOptions::default();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| UploadError::Multipart(e.to_string()))?;
        let name = field.name().unwrap_or_default().to_string();

        let slot = match name.as_str() {
            BASE_FIELD => Some((&mut stashed.base, BASE_FIELD)),
            GARMENT_FIELD => Some((&mut stashed.garment, GARMENT_FIELD)),
            _ => None,
        };

        match slot {
            Some((slot, field_name)) => {
                if slot.is_some() {
                    return Err(UploadError::Multipart(format!("Only one file allowed for '{}'", field_name)).into());
                }
                let bytes = read_field(&mut field, max_bytes).await?;
                debug!(field = field_name, bytes = bytes.len(), "Received upload");
                *slot = Some(store.put(bytes.freeze()).await?);
            }
            None if OPTION_FIELDS.contains(&name.as_str()) => {
                let bytes = read_field(&mut field, MAX_OPTION_BYTES).await.map_err(|e| match e {
                    UploadError::TooLarge { limit } => {
                        TryOnError::InvalidOption(format!("{} exceeds {} bytes", name, limit))
                    }
                    other => other.into(),
                })?;
                let value = std::str::from_utf8(&bytes)
                    .map_err(|_| TryOnError::InvalidOption(format!("{} is not valid UTF-8", name)))?;
                options.set(&name, value)?;
            }
            None => {
                let bytes = drain_field(&mut field).await?;
                debug!(field = %name, bytes = bytes, "Ignoring unknown form field");
            }
        }
    }

    Ok(options)
}

/// Decoded, composited and encoded result of one try-on
struct TryOnOutput {
    encoded: Vec<u8>,
    layout: LayoutRect,
    width: u32,
    height: u32,
}

fn run_tryon(
    base_bytes: &[u8],
    garment_bytes: &[u8],
    config: &LayoutConfig,
    format: OutputFormat,
    jpeg_quality: u8,
) -> Result<TryOnOutput, TryOnError> {
    let base = codec::decode(base_bytes)?;
    let garment = codec::decode(garment_bytes)?;

    let result = composite(&base, &garment, config)?;
    let (width, height) = result.image.dimensions();
    let encoded = codec::encode(&result.image, format, jpeg_quality)?;

    Ok(TryOnOutput {
        encoded,
        layout: result.layout,
        width,
        height,
    })
}

/// Everything the handler needs to answer a successful try-on
struct TryOnOutcome {
    output: TryOnOutput,
    format: OutputFormat,
    encoding: OutputEncoding,
    elapsed_ms: u64,
}

impl TryOnOutcome {
    fn into_response(self) -> HttpResponse {
        let TryOnOutcome { output, format, encoding, elapsed_ms } = self;

        match encoding {
            OutputEncoding::Bytes => {
                let layout = output.layout;
                HttpResponse::Ok()
                    .content_type(format.mime_type())
                    .insert_header((
                        LAYOUT_HEADER,
                        format!("{},{},{},{}", layout.x, layout.y, layout.width, layout.height),
                    ))
                    .body(output.encoded)
            }
            OutputEncoding::DataUrl => HttpResponse::Ok().json(TryOnResponse {
                success: true,
                preview: codec::to_data_url(&output.encoded, format),
                layout: output.layout,
                metadata: TryOnMetadata {
                    processing_time_ms: elapsed_ms,
                    dimensions: Dimensions {
                        width: output.width,
                        height: output.height,
                    },
                    format,
                    bytes: output.encoded.len(),
                },
            }),
        }
    }
}

async fn process_tryon(state: &AppState, mut payload: Multipart) -> Result<TryOnOutcome, TryOnError> {
    let start = Instant::now();
    let store = state.upload_store.as_ref();

    let mut stashed = StashedUploads::default();
    let options = match receive_uploads(&mut payload, store, &mut stashed, state.settings.uploads.max_bytes).await {
        Ok(options) => options,
        Err(e) => {
            stashed.discard(store).await;
            return Err(e);
        }
    };

    let (base, garment) = match (stashed.base, stashed.garment) {
        (Some(base), Some(garment)) => (base, garment),
        (base, garment) => {
            let missing = if base.is_none() { BASE_FIELD } else { GARMENT_FIELD };
            StashedUploads { base, garment }.discard(store).await;
            return Err(UploadError::MissingField(missing).into());
        }
    };

    let base_bytes = match store.take(base).await {
        Ok(bytes) => bytes,
        Err(e) => {
            store.discard(garment).await;
            return Err(e.into());
        }
    };
    let garment_bytes = store.take(garment).await?;

    let config = options.resolve(state.settings.compositor.preset);
    let format = options.format.unwrap_or(state.settings.compositor.output_format);
    let encoding = options.encoding.unwrap_or_default();
    let jpeg_quality = state.settings.compositor.jpeg_quality;

    debug!(
        store = store.kind(),
        width_fraction = config.width_fraction,
        vertical_offset_fraction = config.vertical_offset_fraction,
        format = ?format,
        encoding = ?encoding,
        "Compositing try-on"
    );

    let output = web::block(move || run_tryon(&base_bytes, &garment_bytes, &config, format, jpeg_quality))
        .await
        .map_err(|e| TryOnError::Worker(e.to_string()))??;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        width = output.width,
        height = output.height,
        bytes = output.encoded.len(),
        processing_time_ms = elapsed_ms,
        "Try-on composited"
    );

    Ok(TryOnOutcome {
        output,
        format,
        encoding,
        elapsed_ms,
    })
}

/// POST /api/v1/tryon - Composite a garment onto a user photo
#[utoipa::path(
    post,
    path = "/api/v1/tryon",
    tag = "tryon",
    request_body(content = TryOnForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Garment composited (JSON, or the image itself when encoding=bytes)", body = TryOnResponse),
        (status = 400, description = "Upload missing or layout invalid", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 422, description = "Image could not be decoded", body = ErrorResponse),
        (status = 500, description = "Processing failed", body = ErrorResponse)
    )
)]
pub async fn tryon(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    match process_tryon(&state, payload).await {
        Ok(outcome) => outcome.into_response(),
        Err(e) => {
            error!(error = %e, "Error applying virtual try-on");
            e.into_response()
        }
    }
}

/// POST /api/v1/tryon/layout - Compute placement without pixels
#[utoipa::path(
    post,
    path = "/api/v1/tryon/layout",
    tag = "tryon",
    request_body = LayoutPreviewRequest,
    responses(
        (status = 200, description = "Placement computed", body = LayoutPreviewResponse),
        (status = 400, description = "Invalid dimensions or layout", body = ErrorResponse)
    )
)]
pub async fn preview_layout(
    state: web::Data<AppState>,
    body: web::Json<LayoutPreviewRequest>,
) -> HttpResponse {
    let config = body
        .config
        .unwrap_or_else(|| body.preset.unwrap_or(state.settings.compositor.preset).config());

    match compute_layout(body.base.width, body.base.height, body.overlay.width, body.overlay.height, &config) {
        Ok(layout) => HttpResponse::Ok().json(LayoutPreviewResponse {
            success: true,
            config,
            layout,
        }),
        Err(e) => TryOnError::from(e).into_response(),
    }
}
