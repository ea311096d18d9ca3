//! Folio: bibliographic metadata aggregation service.
//!
//! This crate hosts the [`folio_metadata`] aggregation core:
//! Query → Providers (concurrently) → Scorer → Merger → one canonical record
//!
//! # Architecture
//!
//! - **Config**: one TOML file, every section optional ([`config`])
//! - **Providers**: Open Library and Google Books over HTTP, registered
//!   explicitly from config ([`providers`])
//! - **Server**: JSON fetch endpoint plus a Server-Sent Events progress
//!   stream via `axum` ([`server`])
//! - **CLI**: the `folio` binary (`serve`, `fetch`, `providers`)

pub mod config;
pub mod error;
pub mod providers;
pub mod server;

use std::sync::Arc;

pub use config::FolioConfig;
pub use error::{FolioError, Result};
pub use folio_metadata;

/// Build the fetch service for `config`: validated config, built-in
/// providers, orchestrator, scorer and merger.
///
/// # Errors
///
/// Returns [`FolioError::Config`] if any section is invalid.
pub fn build_service(config: &FolioConfig) -> Result<folio_metadata::FetchService> {
    config.validate()?;
    let registry = Arc::new(providers::build_registry(&config.providers));
    folio_metadata::FetchService::new(registry, config.metadata.clone())
        .map_err(|e| FolioError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_service_from_defaults() {
        let service = build_service(&FolioConfig::default()).expect("service");
        assert_eq!(service.orchestrator().registry().len(), 2);
    }

    #[test]
    fn build_service_rejects_invalid_config() {
        let mut config = FolioConfig::default();
        config.metadata.merge.score_threshold_ratio = 2.0;
        assert!(matches!(build_service(&config), Err(FolioError::Config(_))));
    }
}
