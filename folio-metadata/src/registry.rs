//! Provider registry.
//!
//! The [`ProviderRegistry`] holds every known provider keyed by its source
//! id. It is built once at startup through explicit registration calls and
//! then shared (behind an `Arc`) with the orchestrator and fetch service.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::ProviderError;
use crate::orchestrator::search::panic_message;
use crate::provider::MetadataProvider;

/// A deferred provider constructor.
///
/// Factories let construction failures be isolated per provider: one bad
/// provider (an error or a panic) is logged and skipped without affecting
/// the rest.
pub type ProviderFactory =
    Box<dyn FnOnce() -> Result<Arc<dyn MetadataProvider>, ProviderError> + Send>;

/// Registry of metadata providers keyed by source id.
///
/// Iteration order is sorted by id so that `all()` and `enabled()` are
/// stable across runs.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of factories.
    ///
    /// Each factory is registered independently; failures are logged and
    /// skipped.
    pub fn from_factories<I>(factories: I) -> Self
    where
        I: IntoIterator<Item = ProviderFactory>,
    {
        let mut registry = Self::new();
        for factory in factories {
            registry.register_factory(factory);
        }
        registry
    }

    /// Register a provider, replacing any existing provider with the same id.
    ///
    /// A provider reporting a blank id, or panicking while reporting its
    /// source info, is rejected and logged. Returns whether the provider was
    /// registered.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) -> bool {
        let info = match panic::catch_unwind(AssertUnwindSafe(|| provider.source_info())) {
            Ok(info) => info,
            Err(payload) => {
                tracing::error!(
                    panic = %panic_message(payload),
                    "metadata provider panicked reporting its source info; skipping"
                );
                return false;
            }
        };
        let id = info.id.trim().to_owned();
        if id.is_empty() {
            tracing::warn!(name = %info.name, "skipping provider with empty source id");
            return false;
        }
        if self.providers.contains_key(&id) {
            tracing::warn!(provider = %id, "provider id already registered; overwriting");
        }
        tracing::debug!(provider = %id, name = %info.name, "registered metadata provider");
        self.providers.insert(id, provider);
        true
    }

    /// Construct a provider through `factory` and register it.
    ///
    /// Construction errors and panics are logged and the provider is
    /// skipped. Returns whether a provider was registered.
    pub fn register_factory<F>(&mut self, factory: F) -> bool
    where
        F: FnOnce() -> Result<Arc<dyn MetadataProvider>, ProviderError>,
    {
        match panic::catch_unwind(AssertUnwindSafe(factory)) {
            Ok(Ok(provider)) => self.register(provider),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "failed to construct metadata provider; skipping");
                false
            }
            Err(payload) => {
                tracing::error!(
                    panic = %panic_message(payload),
                    "metadata provider constructor panicked; skipping"
                );
                false
            }
        }
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers.get(id).cloned()
    }

    /// All registered provider ids.
    pub fn list_ids(&self) -> BTreeSet<String> {
        self.providers.keys().cloned().collect()
    }

    /// Every registered provider, enabled or not.
    pub fn all(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers.values().cloned().collect()
    }

    /// Providers whose `is_enabled()` currently returns `true`.
    pub fn enabled(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .values()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect()
    }

    /// Resolve ids to providers, silently dropping unknown ids.
    ///
    /// Duplicate ids resolve once, in first-seen order.
    pub fn resolve(&self, ids: &[String]) -> Vec<Arc<dyn MetadataProvider>> {
        let mut seen = BTreeSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EnabledFlag;
    use crate::types::{MetadataRecord, SourceInfo};
    use async_trait::async_trait;

    struct NamedProvider {
        id: &'static str,
        name: &'static str,
        enabled: EnabledFlag,
    }

    impl NamedProvider {
        fn arc(id: &'static str, name: &'static str) -> Arc<dyn MetadataProvider> {
            Arc::new(Self {
                id,
                name,
                enabled: EnabledFlag::default(),
            })
        }
    }

    #[async_trait]
    impl MetadataProvider for NamedProvider {
        fn source_info(&self) -> SourceInfo {
            SourceInfo::new(self.id, self.name, "", "")
        }
        fn is_enabled(&self) -> bool {
            self.enabled.get()
        }
        fn set_enabled(&self, enabled: bool) {
            self.enabled.set(enabled);
        }
        async fn search(
            &self,
            _query: &str,
            _locale: &str,
            _max_results: usize,
        ) -> Result<Vec<MetadataRecord>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn make_registry() -> ProviderRegistry {
        let mut reg = ProviderRegistry::new();
        reg.register(NamedProvider::arc("beta", "Beta"));
        reg.register(NamedProvider::arc("alpha", "Alpha"));
        reg
    }

    #[test]
    fn register_and_get() {
        let reg = make_registry();
        let provider = reg.get("alpha").expect("alpha registered");
        assert_eq!(provider.source_info().name, "Alpha");
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn list_ids_sorted() {
        let reg = make_registry();
        let ids: Vec<String> = reg.list_ids().into_iter().collect();
        assert_eq!(ids, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn duplicate_id_overwrites() {
        let mut reg = make_registry();
        reg.register(NamedProvider::arc("alpha", "Alpha v2"));
        assert_eq!(reg.len(), 2);
        let provider = reg.get("alpha").expect("alpha registered");
        assert_eq!(provider.source_info().name, "Alpha v2");
    }

    #[test]
    fn enabled_filters_disabled() {
        let reg = make_registry();
        reg.get("beta").expect("beta").set_enabled(false);
        let enabled: Vec<String> = reg.enabled().iter().map(|p| p.id()).collect();
        assert_eq!(enabled, vec!["alpha".to_string()]);
        assert_eq!(reg.all().len(), 2);
    }

    #[test]
    fn blank_id_rejected() {
        let mut reg = ProviderRegistry::new();
        assert!(!reg.register(NamedProvider::arc("  ", "Nameless")));
        assert!(reg.is_empty());
    }

    #[test]
    fn failing_factory_does_not_block_others() {
        let factories: Vec<ProviderFactory> = vec![
            Box::new(|| Ok(NamedProvider::arc("one", "One"))),
            Box::new(|| Err(ProviderError::Provider("missing api key".into()))),
            Box::new(|| Ok(NamedProvider::arc("three", "Three"))),
        ];
        let reg = ProviderRegistry::from_factories(factories);
        assert_eq!(reg.len(), 2);
        assert!(reg.get("one").is_some());
        assert!(reg.get("three").is_some());
    }

    struct BrokenInfo;

    #[async_trait]
    impl MetadataProvider for BrokenInfo {
        fn source_info(&self) -> SourceInfo {
            panic!("source info unavailable")
        }
        fn is_enabled(&self) -> bool {
            true
        }
        fn set_enabled(&self, _enabled: bool) {}
        async fn search(
            &self,
            _query: &str,
            _locale: &str,
            _max_results: usize,
        ) -> Result<Vec<MetadataRecord>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn panicking_factory_does_not_block_others() {
        let factories: Vec<ProviderFactory> = vec![
            Box::new(|| Ok(NamedProvider::arc("one", "One"))),
            Box::new(|| -> Result<Arc<dyn MetadataProvider>, ProviderError> {
                panic!("constructor exploded")
            }),
            Box::new(|| Ok(NamedProvider::arc("three", "Three"))),
        ];
        let reg = ProviderRegistry::from_factories(factories);
        assert_eq!(reg.len(), 2);
        assert!(reg.get("one").is_some());
        assert!(reg.get("three").is_some());
    }

    #[test]
    fn panicking_source_info_does_not_block_others() {
        let factories: Vec<ProviderFactory> = vec![
            Box::new(|| Ok(NamedProvider::arc("one", "One"))),
            Box::new(|| Ok(Arc::new(BrokenInfo) as Arc<dyn MetadataProvider>)),
            Box::new(|| Ok(NamedProvider::arc("three", "Three"))),
        ];
        let reg = ProviderRegistry::from_factories(factories);
        assert_eq!(reg.len(), 2);
        assert_eq!(
            reg.list_ids().into_iter().collect::<Vec<_>>(),
            vec!["one".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn register_rejects_panicking_source_info() {
        let mut reg = ProviderRegistry::new();
        assert!(!reg.register(Arc::new(BrokenInfo)));
        assert!(reg.is_empty());
    }

    #[test]
    fn resolve_drops_unknown_and_duplicates() {
        let reg = make_registry();
        let ids = vec![
            "beta".to_string(),
            "ghost".to_string(),
            "beta".to_string(),
            "alpha".to_string(),
        ];
        let resolved: Vec<String> = reg.resolve(&ids).iter().map(|p| p.id()).collect();
        assert_eq!(resolved, vec!["beta".to_string(), "alpha".to_string()]);
    }
}
