// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic in-process backend
//!
//! Replays a fixed list of [`StreamEvent`]s for every call and records what it
//! was asked to do, so handler tests can run without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{self, BoxStream, StreamExt};

use super::{GenerationBackend, GenerationRequest, GenerativeModel, ProviderError, StreamEvent};

/// One observed `stream_generate` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub model_id: String,
    pub request: GenerationRequest,
}

#[derive(Default)]
struct Counters {
    models_opened: AtomicUsize,
    streams_opened: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Clone)]
pub struct ScriptedBackend {
    events: Arc<Vec<StreamEvent>>,
    rejected_models: Arc<Vec<String>>,
    never_finish: bool,
    counters: Arc<Counters>,
}

impl ScriptedBackend {
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events: Arc::new(events),
            rejected_models: Arc::new(Vec::new()),
            never_finish: false,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Backend that streams the given text fragments and completes normally
    pub fn with_text<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            fragments
                .into_iter()
                .map(|f| StreamEvent::Text(f.into()))
                .collect(),
        )
    }

    /// Refuse to build a handle for `model_id`, like an unknown remote model
    pub fn rejecting_model(mut self, model_id: &str) -> Self {
        let mut rejected = (*self.rejected_models).clone();
        rejected.push(model_id.to_string());
        self.rejected_models = Arc::new(rejected);
        self
    }

    /// After the scripted events, hang instead of ending the stream
    pub fn never_finishing(mut self) -> Self {
        self.never_finish = true;
        self
    }

    /// Number of successful `model` calls
    pub fn models_opened(&self) -> usize {
        self.counters.models_opened.load(Ordering::SeqCst)
    }

    /// Number of `stream_generate` calls
    pub fn streams_opened(&self) -> usize {
        self.counters.streams_opened.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.counters
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self, model_id: &str) -> Result<Arc<dyn GenerativeModel>, ProviderError> {
        if self.rejected_models.iter().any(|m| m == model_id) {
            return Err(ProviderError::InvalidModel(model_id.to_string()));
        }
        self.counters.models_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedModel {
            model_id: model_id.to_string(),
            backend: self.clone(),
        }))
    }
}

struct ScriptedModel {
    model_id: String,
    backend: ScriptedBackend,
}

impl GenerativeModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn stream_generate(&self, request: GenerationRequest) -> BoxStream<'static, StreamEvent> {
        let counters = &self.backend.counters;
        counters.streams_opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = counters.calls.lock() {
            calls.push(RecordedCall {
                model_id: self.model_id.clone(),
                request,
            });
        }

        let scripted = stream::iter((*self.backend.events).clone());
        if self.backend.never_finish {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        }
    }
}
