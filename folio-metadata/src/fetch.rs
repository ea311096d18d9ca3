//! The fetch use case: one structured query in, one reconciled record out.
//!
//! [`FetchService`] drives the orchestrator, scores every candidate, sorts
//! them best-first and merges them. Recoverable failures become an absent
//! result; configuration and contract errors propagate.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{FetchConfig, MetadataConfig};
use crate::error::{MetadataError, Result};
use crate::merge::Merger;
use crate::orchestrator::search::new_request_id;
use crate::orchestrator::{
    EventSink, SearchEvent, SearchEventKind, SearchOrchestrator, SearchRequest,
};
use crate::registry::ProviderRegistry;
use crate::scoring::Scorer;
use crate::types::{MetadataQuery, MetadataRecord, ScoredMetadataRecord};

/// Fetches and reconciles metadata for one work.
pub struct FetchService {
    orchestrator: Arc<SearchOrchestrator>,
    scorer: Scorer,
    merger: Merger,
    config: FetchConfig,
}

impl FetchService {
    /// Build a service over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Config`] if `config` fails validation.
    pub fn new(registry: Arc<ProviderRegistry>, config: MetadataConfig) -> Result<Self> {
        config.validate()?;
        let orchestrator = Arc::new(SearchOrchestrator::new(registry, &config.orchestrator));
        Ok(Self {
            orchestrator,
            scorer: Scorer::new(config.scoring),
            merger: Merger::from_config(&config.merge),
            config: config.fetch,
        })
    }

    /// The orchestrator this service drives. Shared with live streams.
    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    /// Fetch one canonical record for `query`.
    ///
    /// Returns `Ok(None)` when the query has no search terms, when no
    /// provider produced a record, or when a recoverable error occurred.
    ///
    /// # Errors
    ///
    /// Only non-recoverable errors ([`MetadataError::Config`],
    /// [`MetadataError::EmptyMerge`]) are returned.
    pub async fn fetch(&self, query: &MetadataQuery) -> Result<Option<MetadataRecord>> {
        self.fetch_with_sink(query, None).await
    }

    /// Like [`fetch`](Self::fetch), reporting search lifecycle events to `sink`.
    ///
    /// When `fetch.timeout_seconds` elapses first, the search is cancelled and
    /// `sink` receives a terminal `search.failed` event in place of
    /// `completed`.
    pub async fn fetch_with_sink(
        &self,
        query: &MetadataQuery,
        sink: Option<&dyn EventSink>,
    ) -> Result<Option<MetadataRecord>> {
        match self.try_fetch(query, sink).await {
            Ok(record) => Ok(record),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, "metadata fetch failed; returning no record");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn try_fetch(
        &self,
        query: &MetadataQuery,
        sink: Option<&dyn EventSink>,
    ) -> Result<Option<MetadataRecord>> {
        if !query.has_search_terms() {
            tracing::debug!("metadata query has no search terms; skipping");
            return Ok(None);
        }
        if query.max_results_per_provider == 0 {
            return Err(MetadataError::InvalidQuery(
                "max_results_per_provider must be greater than 0".into(),
            ));
        }

        let request = self.search_request(query);
        let request_id = request.request_id.clone().unwrap_or_else(new_request_id);
        let search = self
            .orchestrator
            .search(request.with_request_id(request_id.clone()), sink);
        let records = match self.config.timeout_seconds {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), search).await {
                Ok(records) => records,
                Err(_) => {
                    let message = format!("no result within {secs}s");
                    if let Some(sink) = sink {
                        let kind = SearchEventKind::SearchFailed {
                            message: message.clone(),
                        };
                        sink.emit(SearchEvent::now(request_id, kind)).await;
                    }
                    return Err(MetadataError::Timeout(message));
                }
            },
            None => search.await,
        };

        if records.is_empty() {
            tracing::debug!("no provider returned a record");
            return Ok(None);
        }

        let mut scored = self.scorer.score_all(records, query);
        rank(&mut scored);
        let merged = self.merger.merge(&scored)?;
        tracing::debug!(
            candidates = scored.len(),
            best_score = scored[0].score,
            source = %merged.source_id,
            strategy = ?self.merger.strategy(),
            "merged metadata record"
        );
        Ok(Some(merged))
    }

    /// The orchestrator request `query` maps to.
    ///
    /// The provider set is the query's `provider_ids`, falling back to
    /// `fetch.enabled_providers`, then to every enabled provider.
    pub fn search_request(&self, query: &MetadataQuery) -> SearchRequest {
        let mut request = SearchRequest::new(query.search_text())
            .with_locale(query.locale.clone())
            .with_max_results(query.max_results_per_provider);
        let providers = query
            .provider_ids
            .clone()
            .or_else(|| self.config.enabled_providers.clone());
        if let Some(ids) = providers {
            request = request.with_providers(ids);
        }
        request
    }
}

/// Stable sort by descending score.
fn rank(scored: &mut [ScoredMetadataRecord]) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
}
