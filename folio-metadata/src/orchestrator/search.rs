//! Core search orchestrator: bounded concurrent fan-out across providers.
//!
//! Every provider call runs on its own Tokio task, gated by a semaphore
//! sized to the worker pool width. Completions are drained one at a time,
//! in completion order, by the task that called [`SearchOrchestrator::search`];
//! that task alone owns the running totals, so no locking is needed around
//! them.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};

use crate::config::OrchestratorConfig;
use crate::error::ProviderError;
use crate::provider::MetadataProvider;
use crate::registry::ProviderRegistry;
use crate::types::{MetadataRecord, SourceInfo, DEFAULT_LOCALE, DEFAULT_MAX_RESULTS_PER_PROVIDER};

use super::events::{EventSink, SearchEvent, SearchEventKind};

/// Parameters of one fan-out search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Free-text query handed to every provider.
    pub query: String,
    pub locale: String,
    pub max_results_per_provider: usize,
    /// Explicit provider selection; unknown ids are dropped. `None` runs
    /// every enabled provider.
    pub provider_ids: Option<Vec<String>>,
    /// Correlation id for events. Generated when absent.
    pub request_id: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            locale: DEFAULT_LOCALE.to_owned(),
            max_results_per_provider: DEFAULT_MAX_RESULTS_PER_PROVIDER,
            provider_ids: None,
            request_id: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results_per_provider = max_results;
        self
    }

    pub fn with_providers(mut self, ids: Vec<String>) -> Self {
        self.provider_ids = Some(ids);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Final tallies of one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub request_id: String,
    /// Every record from every successful provider, in completion order.
    pub results: Vec<MetadataRecord>,
    pub providers_completed: usize,
    pub providers_failed: usize,
    pub total_providers: usize,
    pub duration: Duration,
}

/// Fans a query out to many providers and collects what comes back.
///
/// Provider failures are isolated: they are logged, reported as
/// `provider.failed` events and excluded from the results, but never abort
/// or delay the other providers and never propagate to the caller.
/// Duplicate records across providers are passed through untouched.
pub struct SearchOrchestrator {
    registry: Arc<ProviderRegistry>,
    max_workers: usize,
}

impl SearchOrchestrator {
    /// Create an orchestrator over `registry`.
    ///
    /// A `max_workers` of zero is treated as one.
    pub fn new(registry: Arc<ProviderRegistry>, config: &OrchestratorConfig) -> Self {
        Self {
            registry,
            max_workers: config.max_workers.max(1),
        }
    }

    /// The registry this orchestrator resolves providers from.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run a search and return the accumulated records.
    pub async fn search(
        &self,
        request: SearchRequest,
        sink: Option<&dyn EventSink>,
    ) -> Vec<MetadataRecord> {
        self.search_with_summary(request, sink).await.results
    }

    /// Run a search and return the records together with final tallies.
    ///
    /// # Pipeline
    ///
    /// 1. Resolve providers (explicit ids, or every enabled provider). An
    ///    empty set returns immediately without emitting events.
    /// 2. Emit `started`.
    /// 3. Spawn one task per provider behind the worker-pool semaphore, then
    ///    emit `provider.started` for each.
    /// 4. Drain completions in completion order, emitting
    ///    `provider.completed`/`provider.failed` followed by `progress`.
    /// 5. Emit `completed` and return.
    ///
    /// Dropping the returned future aborts provider calls still in flight.
    pub async fn search_with_summary(
        &self,
        request: SearchRequest,
        sink: Option<&dyn EventSink>,
    ) -> SearchSummary {
        let request_id = request.request_id.clone().unwrap_or_else(new_request_id);
        let providers = match &request.provider_ids {
            Some(ids) => self.registry.resolve(ids),
            None => self.registry.enabled(),
        };

        if providers.is_empty() {
            tracing::debug!(request_id = %request_id, "no providers resolved; skipping search");
            return SearchSummary {
                request_id,
                results: Vec::new(),
                providers_completed: 0,
                providers_failed: 0,
                total_providers: 0,
                duration: Duration::ZERO,
            };
        }

        let started_at = Instant::now();
        let emitter = Emitter {
            request_id: &request_id,
            sink,
        };
        let infos: Vec<SourceInfo> = providers.iter().map(|p| p.source_info()).collect();
        let total = infos.len();

        tracing::debug!(
            request_id = %request_id,
            providers = total,
            workers = self.max_workers,
            "starting metadata search"
        );
        tracing::trace!(query = %request.query, locale = %request.locale, "metadata search query");

        emitter
            .emit(SearchEventKind::Started {
                query: request.query.clone(),
                locale: request.locale.clone(),
                provider_ids: infos.iter().map(|i| i.id.clone()).collect(),
                total_providers: total,
            })
            .await;

        let pool = Arc::new(Semaphore::new(self.max_workers));
        let mut pending = FuturesUnordered::new();
        let mut guard = AbortOnDrop(Vec::with_capacity(total));

        for (index, provider) in providers.into_iter().enumerate() {
            let handle = tokio::spawn(run_provider(
                provider,
                Arc::clone(&pool),
                request.query.clone(),
                request.locale.clone(),
                request.max_results_per_provider,
            ));
            guard.0.push(handle.abort_handle());
            pending.push(handle.map(move |joined| (index, joined)));
        }

        for info in &infos {
            emitter
                .emit(SearchEventKind::ProviderStarted {
                    provider_id: info.id.clone(),
                    provider_name: info.name.clone(),
                })
                .await;
        }

        let mut acc = SearchAccumulator::new(total);

        while let Some((index, joined)) = pending.next().await {
            let info = &infos[index];
            let outcome = match joined {
                Ok(run) => run.into_outcome(),
                Err(err) => panic_outcome(err, started_at.elapsed()),
            };

            match outcome {
                ProviderOutcome::Success { records, duration } => {
                    let count = records.len();
                    acc.record_success(records);
                    tracing::debug!(
                        provider = %info.id,
                        count,
                        duration_ms = millis(duration),
                        "provider returned results"
                    );
                    emitter
                        .emit(SearchEventKind::ProviderCompleted {
                            provider_id: info.id.clone(),
                            provider_name: info.name.clone(),
                            result_count: count,
                            duration_ms: millis(duration),
                        })
                        .await;
                }
                ProviderOutcome::Failure {
                    error,
                    duration,
                    unexpected,
                } => {
                    acc.record_failure();
                    if unexpected {
                        tracing::error!(
                            provider = %info.id,
                            request_id = %request_id,
                            error = %error,
                            duration_ms = millis(duration),
                            "provider crashed during search"
                        );
                    } else {
                        tracing::warn!(
                            provider = %info.id,
                            kind = %error.kind(),
                            error = %error,
                            "provider search failed"
                        );
                    }
                    emitter
                        .emit(SearchEventKind::ProviderFailed {
                            provider_id: info.id.clone(),
                            provider_name: info.name.clone(),
                            error_kind: error.kind(),
                            message: error.message().to_owned(),
                            duration_ms: millis(duration),
                        })
                        .await;
                }
            }

            emitter.emit(acc.progress()).await;
        }

        guard.0.clear();
        let duration = started_at.elapsed();

        tracing::debug!(
            request_id = %request_id,
            results = acc.results.len(),
            completed = acc.providers_completed,
            failed = acc.providers_failed,
            duration_ms = millis(duration),
            "metadata search finished"
        );

        emitter
            .emit(SearchEventKind::Completed {
                total_results: acc.results.len(),
                providers_completed: acc.providers_completed,
                providers_failed: acc.providers_failed,
                total_providers: acc.total_providers,
                duration_ms: millis(duration),
                results: acc.results.clone(),
            })
            .await;

        SearchSummary {
            request_id,
            results: acc.results,
            providers_completed: acc.providers_completed,
            providers_failed: acc.providers_failed,
            total_providers: acc.total_providers,
            duration,
        }
    }
}

/// Running totals owned by the draining task.
#[derive(Debug)]
struct SearchAccumulator {
    results: Vec<MetadataRecord>,
    providers_completed: usize,
    providers_failed: usize,
    total_providers: usize,
}

impl SearchAccumulator {
    fn new(total_providers: usize) -> Self {
        Self {
            results: Vec::new(),
            providers_completed: 0,
            providers_failed: 0,
            total_providers,
        }
    }

    fn record_success(&mut self, records: Vec<MetadataRecord>) {
        self.results.extend(records);
        self.providers_completed += 1;
    }

    fn record_failure(&mut self) {
        self.providers_failed += 1;
    }

    fn progress(&self) -> SearchEventKind {
        SearchEventKind::Progress {
            providers_completed: self.providers_completed,
            providers_failed: self.providers_failed,
            total_providers: self.total_providers,
            results_so_far: self.results.len(),
        }
    }
}

/// What a worker task hands back.
struct ProviderRun {
    result: Result<Vec<MetadataRecord>, ProviderError>,
    duration: Duration,
}

impl ProviderRun {
    fn into_outcome(self) -> ProviderOutcome {
        match self.result {
            Ok(records) => ProviderOutcome::Success {
                records,
                duration: self.duration,
            },
            Err(error) => ProviderOutcome::Failure {
                error,
                duration: self.duration,
                unexpected: false,
            },
        }
    }
}

enum ProviderOutcome {
    Success {
        records: Vec<MetadataRecord>,
        duration: Duration,
    },
    Failure {
        error: ProviderError,
        duration: Duration,
        /// The provider did not return a typed error (it panicked or its
        /// task was torn down).
        unexpected: bool,
    },
}

async fn run_provider(
    provider: Arc<dyn MetadataProvider>,
    pool: Arc<Semaphore>,
    query: String,
    locale: String,
    max_results: usize,
) -> ProviderRun {
    // The semaphore is never closed, so a failed acquire cannot happen.
    let _permit = pool.acquire_owned().await.ok();
    let started = Instant::now();
    let result = provider.search(&query, &locale, max_results).await;
    ProviderRun {
        result,
        duration: started.elapsed(),
    }
}

fn panic_outcome(err: JoinError, elapsed: Duration) -> ProviderOutcome {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "provider task was cancelled".to_owned()
    };
    ProviderOutcome::Failure {
        error: ProviderError::Provider(message),
        duration: elapsed,
        unexpected: true,
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "provider panicked".to_owned()
    }
}

/// Aborts provider tasks still running when the search future is dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

struct Emitter<'a> {
    request_id: &'a str,
    sink: Option<&'a dyn EventSink>,
}

impl Emitter<'_> {
    async fn emit(&self, kind: SearchEventKind) {
        if let Some(sink) = self.sink {
            tracing::trace!(request_id = %self.request_id, event = kind.name(), "search event");
            sink.emit(SearchEvent::now(self.request_id, kind)).await;
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Generate a fresh request id.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
