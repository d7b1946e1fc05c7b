// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relay of upstream stream events into the HTTP response body
//!
//! Once the response has started its status can no longer change, so every
//! upstream failure is reported in-band as a `<<ERROR: ...>>` marker and ends
//! the body.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tracing::{error, warn};

use crate::provider::StreamEvent;

/// Generic marker for transport and unexpected failures
pub const SERVER_ERROR_MARKER: &str = "<<ERROR: Server error during processing>>";

/// What the relay does with one upstream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStep {
    /// Write the text and keep going
    Forward(String),
    /// Nothing to write
    Skip,
    /// Write the marker and end the body
    Terminate(String),
}

pub fn blocked_marker(reason: &str) -> String {
    format!("<<ERROR: Request blocked ({})>>", reason)
}

pub fn stopped_marker(reason: &str) -> String {
    format!("<<ERROR: Request stopped ({})>>", reason)
}

/// Map one event to a relay step
pub fn translate(event: StreamEvent) -> RelayStep {
    match event {
        StreamEvent::Text(text) if text.is_empty() => RelayStep::Skip,
        StreamEvent::Text(text) => RelayStep::Forward(text),
        StreamEvent::Blocked(reason) => RelayStep::Terminate(blocked_marker(&reason)),
        StreamEvent::Stopped(reason) => RelayStep::Terminate(stopped_marker(&reason)),
        StreamEvent::TransportError(_) => RelayStep::Terminate(SERVER_ERROR_MARKER.to_string()),
    }
}

fn log_termination(event: &StreamEvent, request_id: &str) {
    match event {
        StreamEvent::Blocked(reason) => {
            warn!("[{}] Upstream blocked the prompt: {}", request_id, reason)
        }
        StreamEvent::Stopped(reason) => {
            warn!("[{}] Upstream stopped generation: {}", request_id, reason)
        }
        StreamEvent::TransportError(detail) => {
            error!("[{}] Upstream stream failed: {}", request_id, detail)
        }
        StreamEvent::Text(_) => {}
    }
}

/// Relay upstream events as response body chunks
///
/// Text is forwarded byte-for-byte and in order. The first terminal event
/// produces its marker and ends the stream; upstream is not polled again and is
/// dropped with the relay. Each wait for the next event is bounded by
/// `idle_timeout`, and an elapsed wait counts as a transport failure.
pub fn relay_stream<S>(
    events: S,
    idle_timeout: Duration,
    request_id: String,
) -> impl Stream<Item = Bytes> + Send + 'static
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let events = tokio_stream::StreamExt::timeout(events, idle_timeout).map(move |item| {
        item.unwrap_or_else(|_| {
            StreamEvent::TransportError(format!(
                "no upstream data within {}s",
                idle_timeout.as_secs()
            ))
        })
    });

    stream::unfold(Some(Box::pin(events)), move |state| {
        let request_id = request_id.clone();
        async move {
            let mut events = state?;
            while let Some(event) = events.next().await {
                log_termination(&event, &request_id);
                match translate(event) {
                    RelayStep::Forward(text) => return Some((Bytes::from(text), Some(events))),
                    RelayStep::Skip => continue,
                    RelayStep::Terminate(marker) => return Some((Bytes::from(marker), None)),
                }
            }
            None
        }
    })
}
