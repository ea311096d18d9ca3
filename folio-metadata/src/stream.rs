//! Server-Sent Events framing of a live search.
//!
//! A producer task runs the orchestrator and pushes every lifecycle event
//! into a bounded channel; the returned stream drains that channel and
//! renders each event as an SSE frame. The channel is the only state shared
//! between the two sides.
//!
//! Wire format:
//!
//! ```text
//! retry: 2000\n\n
//! data: {"request_id":"…","timestamp_ms":…,"event":"started",…}\n\n
//! …
//! data: {…,"event":"completed",…}\n\n
//! ```
//!
//! The stream always ends with a terminal event: `completed`, or a
//! synthesised `search.failed` when the producer dies.

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::orchestrator::search::new_request_id;
use crate::orchestrator::{
    EventSink, SearchEvent, SearchEventKind, SearchOrchestrator, SearchRequest,
};

/// Client reconnect hint sent as the first frame, in milliseconds.
pub const RETRY_MS: u64 = 2000;

/// Capacity of the producer/consumer channel.
const STREAM_BUFFER: usize = 64;

enum StreamMessage {
    Event(SearchEvent),
    /// Sent exactly once, after the terminal event.
    Close,
}

struct ChannelSink(mpsc::Sender<StreamMessage>);

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: SearchEvent) {
        if self.0.send(StreamMessage::Event(event)).await.is_err() {
            tracing::trace!("event stream consumer went away");
        }
    }
}

/// Run `request` in the background and stream its events as SSE frames.
///
/// Dropping the stream cancels the search, including provider calls still
/// in flight. Must be called from within a Tokio runtime.
pub fn search_event_stream(
    orchestrator: Arc<SearchOrchestrator>,
    request: SearchRequest,
) -> impl Stream<Item = String> + Send + 'static {
    let request_id = request.request_id.clone().unwrap_or_else(new_request_id);
    let request = request.with_request_id(request_id.clone());
    let (tx, mut rx) = mpsc::channel::<StreamMessage>(STREAM_BUFFER);

    tokio::spawn(produce(orchestrator, request, tx));

    async_stream::stream! {
        yield format!("retry: {RETRY_MS}\n\n");

        let mut closed = false;
        let mut terminated = false;
        while let Some(message) = rx.recv().await {
            match message {
                StreamMessage::Event(event) => {
                    terminated |= event.is_terminal();
                    yield frame(&encode_or_fallback(&event, event.name(), &event.request_id));
                }
                StreamMessage::Close => {
                    closed = true;
                    break;
                }
            }
        }

        if !closed && !terminated {
            tracing::error!(
                request_id = %request_id,
                "event producer exited without closing the stream"
            );
            let event = SearchEvent::now(
                request_id.as_str(),
                SearchEventKind::SearchFailed {
                    message: "search worker terminated unexpectedly".into(),
                },
            );
            yield frame(&encode_or_fallback(&event, event.name(), &request_id));
        }
    }
}

/// Supervises the search task and guarantees a terminal event plus exactly
/// one close sentinel.
async fn produce(
    orchestrator: Arc<SearchOrchestrator>,
    request: SearchRequest,
    tx: mpsc::Sender<StreamMessage>,
) {
    let request_id = request.request_id.clone().unwrap_or_default();
    let sink = ChannelSink(tx.clone());
    let mut worker = tokio::spawn(async move {
        orchestrator
            .search_with_summary(request, Some(&sink as &dyn EventSink))
            .await
    });

    let outcome = tokio::select! {
        joined = &mut worker => joined,
        () = tx.closed() => {
            tracing::debug!(request_id = %request_id, "event stream dropped; cancelling search");
            worker.abort();
            return;
        }
    };

    let terminal = match outcome {
        Ok(summary) if summary.total_providers == 0 => Some(SearchEventKind::Completed {
            total_results: 0,
            providers_completed: 0,
            providers_failed: 0,
            total_providers: 0,
            duration_ms: 0,
            results: Vec::new(),
        }),
        Ok(_) => None,
        Err(err) => {
            tracing::error!(request_id = %request_id, error = %err, "search worker failed");
            Some(SearchEventKind::SearchFailed {
                message: format!("search worker failed: {err}"),
            })
        }
    };

    if let Some(kind) = terminal {
        let event = SearchEvent::now(request_id.as_str(), kind);
        if tx.send(StreamMessage::Event(event)).await.is_err() {
            return;
        }
    }
    // A send error means the consumer is gone; nothing left to close.
    let _ = tx.send(StreamMessage::Close).await;
}

fn frame(json: &str) -> String {
    format!("data: {json}\n\n")
}

/// JSON-encode `value`, substituting a minimal event on failure.
///
/// The substitute carries `event`, `request_id`, `timestamp_ms` and a
/// `message` describing the serialisation failure, so a bad payload never
/// drops or breaks the stream.
pub fn encode_or_fallback<T: Serialize>(value: &T, event_name: &str, request_id: &str) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(event = event_name, error = %err, "failed to encode search event");
            let name = if event_name.is_empty() { "unknown" } else { event_name };
            serde_json::json!({
                "event": name,
                "request_id": request_id,
                "timestamp_ms": crate::orchestrator::events::now_ms(),
                "message": format!("failed to serialize event: {err}"),
            })
            .to_string()
        }
    }
}
