//! Configuration module for the try-on service

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;

use crate::domain::GarmentPreset;
use crate::engine::OutputFormat;
use crate::storage::UploadStrategy;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub compositor: CompositorSettings,
    pub uploads: UploadSettings,
    pub assistant: AssistantSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Defaults applied when a try-on request does not specify its own layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompositorSettings {
    pub preset: GarmentPreset,
    pub output_format: OutputFormat,
    pub jpeg_quality: u8,
}

/// Transient upload storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub strategy: UploadStrategy,
    /// Scratch directory, used by the disk strategy only
    pub dir: PathBuf,
    /// Per-file size limit in bytes
    pub max_bytes: usize,
}

/// Generative-language API used by the chat endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Leave empty to disable the chat endpoint
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub rate_limit_per_minute: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with TRYON_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (TRYON__SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("TRYON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings::default(),
            compositor: CompositorSettings::default(),
            uploads: UploadSettings::default(),
            assistant: AssistantSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl Default for CompositorSettings {
    fn default() -> Self {
        CompositorSettings {
            preset: GarmentPreset::UpperBody,
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            strategy: UploadStrategy::Memory,
            dir: std::env::temp_dir().join("tryon-uploads"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        AssistantSettings {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            rate_limit_per_minute: 60,
            max_retries: 2,
            timeout_secs: 30,
        }
    }
}
