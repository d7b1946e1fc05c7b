// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Remote text-generation provider
//!
//! A [`GenerationBackend`] builds one [`GenerativeModel`] handle per request.
//! The handle opens a streaming call and yields [`StreamEvent`]s; turning those
//! events into response bytes is the relay's job.

pub mod gemini;
pub mod prompts;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;
use tracing::{error, info};

use crate::config::RelayConfig;

pub use gemini::{GeminiClient, GeminiModel};
pub use prompts::{GenerationSettings, SYSTEM_INSTRUCTION};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedBackend;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("GOOGLE_API_KEY is not set")]
    MissingApiKey,

    #[error("GOOGLE_API_KEY is malformed")]
    InvalidApiKey,

    #[error("Invalid provider base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Model '{0}' cannot be used with this provider")]
    InvalidModel(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Provider is not configured: {0}")]
    NotConfigured(String),
}

/// One part of the user turn sent to the model
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Bytes },
}

/// Ordered request payload: optional instruction first, then the file
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub parts: Vec<ContentPart>,
}

impl GenerationRequest {
    /// Build the payload for an uploaded document
    ///
    /// Blank instructions are dropped; anything else is sent as
    /// `Additional instruction: <text>` ahead of the file.
    pub fn for_document(instructions: Option<&str>, mime_type: &str, data: Bytes) -> Self {
        let mut parts = Vec::with_capacity(2);
        if let Some(text) = instructions.map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(ContentPart::Text(format!("Additional instruction: {}", text)));
        }
        parts.push(ContentPart::InlineData {
            mime_type: mime_type.to_string(),
            data,
        });
        Self { parts }
    }

    pub fn instruction(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            ContentPart::Text(text) => Some(text.as_str()),
            ContentPart::InlineData { .. } => None,
        })
    }
}

/// A single event observed on the upstream generation stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Extracted text, forwarded verbatim
    Text(String),
    /// The prompt was blocked; carries the provider's block reason
    Blocked(String),
    /// Generation ended for a reason other than normal completion
    Stopped(String),
    /// Transport failure or an unexpected upstream response
    TransportError(String),
}

/// An opened model, ready to stream generations
pub trait GenerativeModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Start a generation call
    ///
    /// The returned stream is lazy: nothing is sent upstream until it is first
    /// polled, and dropping it abandons the call. Failures after that point are
    /// reported as events, never as an `Err`.
    fn stream_generate(&self, request: GenerationRequest) -> BoxStream<'static, StreamEvent>;
}

/// Factory for per-request model handles
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn model(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>, ProviderError>;
}

/// Outcome of the one-time provider setup at process start
#[derive(Clone)]
pub enum ProviderState {
    Ready(Arc<dyn GenerationBackend>),
    Unconfigured { reason: String },
}

impl ProviderState {
    /// Configure the Gemini client from startup configuration
    ///
    /// Failure is logged and recorded rather than returned so the process can
    /// keep running and report the problem on every request.
    pub fn configure(config: &RelayConfig) -> Self {
        let settings = GenerationSettings::from_config(config);
        match GeminiClient::new(config.api_key.as_deref(), &config.api_base_url, settings) {
            Ok(client) => {
                info!("Gemini provider configured ({})", config.api_base_url);
                Self::Ready(Arc::new(client))
            }
            Err(e) => {
                error!("Could not configure Gemini provider: {}", e);
                if matches!(e, ProviderError::MissingApiKey | ProviderError::InvalidApiKey) {
                    error!("-> Set GOOGLE_API_KEY in the environment or a .env file");
                }
                Self::Unconfigured {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn ready(backend: Arc<dyn GenerationBackend>) -> Self {
        Self::Ready(backend)
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn backend(&self) -> Result<&Arc<dyn GenerationBackend>, ProviderError> {
        match self {
            Self::Ready(backend) => Ok(backend),
            Self::Unconfigured { reason } => Err(ProviderError::NotConfigured(reason.clone())),
        }
    }
}

impl std::fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(backend) => f.debug_tuple("Ready").field(&backend.name()).finish(),
            Self::Unconfigured { reason } => f
                .debug_struct("Unconfigured")
                .field("reason", reason)
                .finish(),
        }
    }
}
