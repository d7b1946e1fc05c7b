// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gemini client for streamed text extraction via the REST `streamGenerateContent` API

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use regex::Regex;
use reqwest::header::HeaderValue;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{
    ContentPart, GenerationBackend, GenerationRequest, GenerationSettings, GenerativeModel,
    ProviderError, StreamEvent,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Finish reasons that mean the model simply completed
const NORMAL_FINISH_REASONS: &[&str] = &["STOP", "FINISH_REASON_UNSPECIFIED"];

fn model_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([a-z0-9.\-]*[a-z0-9])?$").expect("model id pattern is valid")
    })
}

// --- Gemini request serde structs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

// --- Gemini stream chunk serde structs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: UpstreamError,
}

impl UpstreamError {
    fn describe(&self) -> String {
        match (&self.status, self.code) {
            (Some(status), _) => format!("{}: {}", status, self.message),
            (None, Some(code)) => format!("{}: {}", code, self.message),
            (None, None) => self.message.clone(),
        }
    }
}

impl StreamChunk {
    /// Events carried by one chunk, in the order they must be relayed
    fn into_events(self) -> Vec<StreamEvent> {
        if let Some(error) = self.error {
            return vec![StreamEvent::TransportError(error.describe())];
        }

        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return vec![StreamEvent::Blocked(reason)];
        }

        let mut events = Vec::new();
        let Some(candidate) = self.candidates.into_iter().next() else {
            debug!("Received empty stream chunk without candidates");
            return events;
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();
        if !text.is_empty() {
            events.push(StreamEvent::Text(text));
        }

        if let Some(reason) = candidate.finish_reason {
            if !NORMAL_FINISH_REASONS.contains(&reason.as_str()) {
                events.push(StreamEvent::Stopped(reason));
            }
        }

        events
    }
}

/// Parse one SSE line into stream events
///
/// Non-`data:` lines (comments, `event:`, `id:`, blank separators) carry
/// nothing for us and yield no events.
pub fn parse_sse_line(line: &str) -> Vec<StreamEvent> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let Some(payload) = line.strip_prefix("data:") else {
        return Vec::new();
    };
    let payload = payload.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return Vec::new();
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk.into_events(),
        Err(e) => vec![StreamEvent::TransportError(format!(
            "Malformed stream chunk: {}",
            e
        ))],
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

/// Turn a raw SSE byte stream into [`StreamEvent`]s
///
/// Lines are split on raw bytes before UTF-8 decoding so a multi-byte
/// character spanning two network chunks is never mangled. A body error ends
/// the stream with a `TransportError`.
///
/// This reads the `bytes_stream` of the single upload POST. An EventSource
/// client would reconnect on errors and resend the whole document.
pub fn sse_events<S, E>(body: S) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    while let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                        state
                            .pending
                            .extend(parse_sse_line(&String::from_utf8_lossy(&line)));
                    }
                }
                Some(Err(e)) => {
                    state
                        .pending
                        .push_back(StreamEvent::TransportError(e.to_string()));
                    state.done = true;
                }
                None => {
                    let rest = std::mem::take(&mut state.buffer);
                    state
                        .pending
                        .extend(parse_sse_line(&String::from_utf8_lossy(&rest)));
                    state.done = true;
                }
            }
        }
    })
}

/// Client for the Gemini REST API
pub struct GeminiClient {
    client: Client,
    api_key: HeaderValue,
    base_url: Url,
    settings: Arc<GenerationSettings>,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// The key is required and must be usable as an HTTP header value. The base
    /// URL is normalised to end with `/` so model paths append beneath it.
    pub fn new(
        api_key: Option<&str>,
        base_url: &str,
        settings: GenerationSettings,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingApiKey)?;
        if api_key.chars().any(char::is_whitespace) {
            return Err(ProviderError::InvalidApiKey);
        }
        let mut api_key = HeaderValue::from_str(api_key).map_err(|_| ProviderError::InvalidApiKey)?;
        api_key.set_sensitive(true);

        let mut base_url = Url::parse(base_url).map_err(|e| ProviderError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        info!("Gemini client configured: base_url={}", base_url);

        Ok(Self {
            client,
            api_key,
            base_url,
            settings: Arc::new(settings),
        })
    }

    /// `.../v1beta/models/{model}:streamGenerateContent?alt=sse`
    pub fn stream_endpoint(&self, model_id: &str) -> Result<Url, ProviderError> {
        let mut endpoint = self
            .base_url
            .join(&format!("v1beta/models/{}:streamGenerateContent", model_id))
            .map_err(|_| ProviderError::InvalidModel(model_id.to_string()))?;
        endpoint.set_query(Some("alt=sse"));
        Ok(endpoint)
    }
}

impl GenerationBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>, ProviderError> {
        if !model_id_pattern().is_match(model_id) {
            return Err(ProviderError::InvalidModel(model_id.to_string()));
        }

        Ok(Arc::new(GeminiModel {
            client: self.client.clone(),
            endpoint: self.stream_endpoint(model_id)?,
            api_key: self.api_key.clone(),
            model_id: model_id.to_string(),
            settings: self.settings.clone(),
        }))
    }
}

/// A Gemini model handle bound to one model id
pub struct GeminiModel {
    client: Client,
    endpoint: Url,
    api_key: HeaderValue,
    model_id: String,
    settings: Arc<GenerationSettings>,
}

impl GeminiModel {
    fn request_body(&self, request: GenerationRequest) -> GenerateContentRequest {
        let parts = request
            .parts
            .into_iter()
            .map(|part| match part {
                ContentPart::Text(text) => RequestPart::Text { text },
                ContentPart::InlineData { mime_type, data } => RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type,
                        data: STANDARD.encode(&data),
                    },
                },
            })
            .collect();

        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts,
            }],
            system_instruction: SystemInstruction {
                parts: vec![RequestPart::Text {
                    text: self.settings.system_instruction.clone(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        }
    }
}

impl GenerativeModel for GeminiModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn stream_generate(&self, request: GenerationRequest) -> BoxStream<'static, StreamEvent> {
        let body = self.request_body(request);
        let pending = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, self.api_key.clone())
            .json(&body);
        let model_id = self.model_id.clone();

        let events = async move {
            debug!("Opening Gemini stream for model {}", model_id);
            match pending.send().await {
                Ok(response) if response.status().is_success() => {
                    sse_events(response.bytes_stream()).boxed()
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                        .map(|envelope| envelope.error.describe())
                        .unwrap_or(body);
                    stream::iter([StreamEvent::TransportError(format!(
                        "HTTP {} from model {}: {}",
                        status, model_id, detail
                    ))])
                    .boxed()
                }
                Err(e) => stream::iter([StreamEvent::TransportError(format!(
                    "Request to model {} failed: {}",
                    model_id, e
                ))])
                .boxed(),
            }
        };

        stream::once(events).flatten().boxed()
    }
}
