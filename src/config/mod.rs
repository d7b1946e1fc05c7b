// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide relay configuration
//!
//! Every field can be given on the command line or through the environment
//! (a `.env` file is loaded before parsing). The parsed value is fixed at
//! startup and shared read-only with every request.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-exp-03-25";
pub const DEFAULT_ALLOWED_MODELS: &str =
    "gemini-2.5-pro-exp-03-25,gemini-2.0-flash,gemini-2.0-flash-lite,gemini-1.5-pro,gemini-1.5-flash";

/// 20 MiB, for both the upload itself and the whole request body
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 20 * 1024 * 1024;

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// What to do with a `model_name` that is not on the allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModelPolicy {
    /// Reject the request with 400
    #[default]
    Strict,
    /// Use the default model instead
    Fallback,
}

/// OCR relay server
#[derive(Parser, Debug, Clone)]
#[command(name = "ocr-relay")]
#[command(version)]
#[command(about = "Streams Gemini text extraction for uploaded images and PDFs", long_about = None)]
pub struct RelayConfig {
    /// Address the HTTP server binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,

    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API
    #[arg(long, env = "GEMINI_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Model used when the client does not pick one
    #[arg(long, env = "DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub default_model: String,

    /// Comma-separated list of models clients may select
    #[arg(
        long,
        env = "ALLOWED_MODELS",
        value_delimiter = ',',
        default_value = DEFAULT_ALLOWED_MODELS
    )]
    pub allowed_models: Vec<String>,

    /// Handling of model names outside the allow-list (strict/fallback)
    #[arg(long, env = "MODEL_POLICY", value_enum, default_value_t = ModelPolicy::Strict)]
    pub model_policy: ModelPolicy,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,

    /// Seconds to wait for the next upstream chunk before giving up
    #[arg(long, env = "UPSTREAM_IDLE_TIMEOUT_SECS", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Directory holding index.html and the front-end assets
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Sampling temperature sent with every generation call
    #[arg(long, env = "GENERATION_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            allowed_models: DEFAULT_ALLOWED_MODELS
                .split(',')
                .map(str::to_string)
                .collect(),
            model_policy: ModelPolicy::Strict,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            static_dir: PathBuf::from("static"),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl RelayConfig {
    /// Bound on the wait for each upstream stream event
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }
}
