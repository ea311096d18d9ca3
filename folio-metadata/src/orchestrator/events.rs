//! Lifecycle events emitted while a search is in flight.
//!
//! # Event Stream Lifecycle
//!
//! ```text
//! started → provider.started × N → (provider.completed | provider.failed, progress) × N → completed
//! ```
//!
//! Guarantees per request:
//!
//! - `started` precedes every provider-scoped event;
//! - a provider's `provider.started` precedes its outcome event;
//! - `progress` counts (`completed + failed`) never decrease;
//! - `completed` is the last event.
//!
//! Outcome events of different providers arrive in completion order, which
//! is not deterministic. `search.failed` is never emitted by the
//! orchestrator; the live stream synthesises it when its worker dies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderErrorKind;
use crate::types::MetadataRecord;

/// One lifecycle event of one search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    /// Correlates every event of one search.
    pub request_id: String,
    /// Wall-clock Unix time in milliseconds.
    pub timestamp_ms: i64,
    /// Variant-specific payload; serialised inline with an `event` tag.
    #[serde(flatten)]
    pub kind: SearchEventKind,
}

impl SearchEvent {
    /// Create an event stamped with the current time.
    pub fn now(request_id: impl Into<String>, kind: SearchEventKind) -> Self {
        Self {
            request_id: request_id.into(),
            timestamp_ms: now_ms(),
            kind,
        }
    }

    /// Wire name of the event (`"provider.completed"`, ...).
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Returns `true` for events after which no more events follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            SearchEventKind::Completed { .. } | SearchEventKind::SearchFailed { .. }
        )
    }
}

/// Payload of a [`SearchEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SearchEventKind {
    /// The search has started. First event of every non-empty search.
    #[serde(rename = "started")]
    Started {
        query: String,
        locale: String,
        /// Ids of the providers taking part.
        provider_ids: Vec<String>,
        total_providers: usize,
    },

    /// A provider call was submitted to the worker pool.
    #[serde(rename = "provider.started")]
    ProviderStarted {
        provider_id: String,
        provider_name: String,
    },

    /// A provider returned records.
    #[serde(rename = "provider.completed")]
    ProviderCompleted {
        provider_id: String,
        provider_name: String,
        result_count: usize,
        duration_ms: u64,
    },

    /// A provider failed; its records are excluded.
    #[serde(rename = "provider.failed")]
    ProviderFailed {
        provider_id: String,
        provider_name: String,
        error_kind: ProviderErrorKind,
        message: String,
        duration_ms: u64,
    },

    /// Running totals, emitted after every provider outcome.
    #[serde(rename = "progress")]
    Progress {
        providers_completed: usize,
        providers_failed: usize,
        total_providers: usize,
        results_so_far: usize,
    },

    /// Every provider has resolved. Last event of the search.
    #[serde(rename = "completed")]
    Completed {
        total_results: usize,
        providers_completed: usize,
        providers_failed: usize,
        total_providers: usize,
        duration_ms: u64,
        results: Vec<MetadataRecord>,
    },

    /// The search ended without `completed`: the live stream's worker died
    /// or the fetch deadline elapsed.
    #[serde(rename = "search.failed")]
    SearchFailed { message: String },
}

impl SearchEventKind {
    /// Wire name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::ProviderStarted { .. } => "provider.started",
            Self::ProviderCompleted { .. } => "provider.completed",
            Self::ProviderFailed { .. } => "provider.failed",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::SearchFailed { .. } => "search.failed",
        }
    }
}

/// Receiver of search lifecycle events.
///
/// The orchestrator calls [`emit`](Self::emit) from the single task that
/// drains provider completions, so implementations never see concurrent
/// calls for the same search.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Delivery failures are the sink's concern.
    async fn emit(&self, event: SearchEvent);
}

#[async_trait]
impl EventSink for mpsc::Sender<SearchEvent> {
    async fn emit(&self, event: SearchEvent) {
        if self.send(event).await.is_err() {
            tracing::trace!("search event receiver dropped");
        }
    }
}

#[async_trait]
impl EventSink for mpsc::UnboundedSender<SearchEvent> {
    async fn emit(&self, event: SearchEvent) {
        if self.send(event).is_err() {
            tracing::trace!("search event receiver dropped");
        }
    }
}

/// Adapts a synchronous callback into an [`EventSink`].
pub struct FnSink<F>(pub F);

#[async_trait]
impl<F> EventSink for FnSink<F>
where
    F: Fn(SearchEvent) + Send + Sync,
{
    async fn emit(&self, event: SearchEvent) {
        (self.0)(event);
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
