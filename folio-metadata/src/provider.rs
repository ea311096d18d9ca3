//! Trait definition for pluggable metadata sources.
//!
//! Each source (Open Library, Google Books, a local catalogue, a test fake)
//! implements [`MetadataProvider`] to give the orchestrator a uniform search
//! capability. How a provider talks to its source is opaque to the core.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{MetadataRecord, SourceInfo};

/// A pluggable metadata source.
///
/// Contract for [`search`](Self::search):
///
/// - returns `Ok(vec![])` (not an error) when the provider is disabled or
///   the query is blank;
/// - otherwise fails with one of the [`ProviderError`] variants, wrapping
///   anything unexpected in [`ProviderError::Provider`]. Failures must never
///   be silently swallowed into an empty result.
///
/// Implementations must be `Send + Sync`; the orchestrator runs each
/// provider on its own worker task.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Describes the source. Must be cheap and stable for the provider's lifetime.
    fn source_info(&self) -> SourceInfo;

    /// Whether the provider takes part in default searches.
    fn is_enabled(&self) -> bool;

    /// Enable or disable the provider at runtime.
    fn set_enabled(&self, enabled: bool);

    /// Search the source.
    async fn search(
        &self,
        query: &str,
        locale: &str,
        max_results: usize,
    ) -> Result<Vec<MetadataRecord>, ProviderError>;

    /// Shorthand for `source_info().id`.
    fn id(&self) -> String {
        self.source_info().id
    }
}

/// Thread-safe enabled flag for provider implementations.
///
/// Lets [`MetadataProvider::set_enabled`] take `&self` so providers can be
/// toggled while shared behind an `Arc`.
#[derive(Debug)]
pub struct EnabledFlag(AtomicBool);

impl EnabledFlag {
    pub fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

impl Default for EnabledFlag {
    fn default() -> Self {
        Self::new(true)
    }
}
