//! # folio-metadata
//!
//! Concurrent multi-source bibliographic metadata aggregation for Folio.
//!
//! Given a partial description of a book (title, authors, ISBN), this crate
//! queries many pluggable metadata providers at once, scores every candidate
//! record for relevance and completeness, and merges the candidates into one
//! canonical record.
//!
//! ## Design
//!
//! - Providers implement [`MetadataProvider`] and are registered explicitly
//!   in a [`ProviderRegistry`] that is injected, never global
//! - [`SearchOrchestrator`] fans a query out on a bounded worker pool and
//!   reports lifecycle [`SearchEvent`]s in completion order
//! - [`Scorer`] and [`Merger`] are pure and configurable through
//!   [`MetadataConfig`]
//! - [`FetchService`] is the single use case tying the pieces together
//! - [`stream::search_event_stream`] renders a live search as Server-Sent
//!   Events
//! - Provider failures are isolated: logged, reported, excluded from results
//!
//! ## Security
//!
//! - No network listeners; this is a library
//! - Query text is logged only at trace level

pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod scoring;
pub mod stream;
pub mod types;

pub use config::MetadataConfig;
pub use error::{MetadataError, ProviderError, ProviderErrorKind, Result};
pub use fetch::FetchService;
pub use merge::{MergeStrategy, Merger};
pub use orchestrator::{
    EventSink, FnSink, SearchEvent, SearchEventKind, SearchOrchestrator, SearchRequest,
    SearchSummary,
};
pub use provider::{EnabledFlag, MetadataProvider};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use scoring::Scorer;
pub use types::{MetadataQuery, MetadataRecord, ScoredMetadataRecord, SourceInfo};

/// Fetch one reconciled record using `registry` and `config`.
///
/// Convenience wrapper that builds a [`FetchService`] for a single call.
///
/// # Errors
///
/// Returns [`MetadataError::Config`] if `config` is invalid; see
/// [`FetchService::fetch`] for the remaining cases.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # async fn example() -> folio_metadata::Result<()> {
/// let registry = Arc::new(folio_metadata::ProviderRegistry::new());
/// let query = folio_metadata::MetadataQuery::by_title("The Hobbit").with_author("J.R.R. Tolkien");
/// if let Some(record) = folio_metadata::fetch(registry, folio_metadata::MetadataConfig::default(), &query).await? {
///     println!("{} ({})", record.title, record.source_id);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch(
    registry: std::sync::Arc<ProviderRegistry>,
    config: MetadataConfig,
    query: &MetadataQuery,
) -> Result<Option<MetadataRecord>> {
    FetchService::new(registry, config)?.fetch(query).await
}
