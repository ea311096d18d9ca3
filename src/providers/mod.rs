//! Built-in metadata providers and their registration.
//!
//! Providers are registered explicitly from configuration: each enabled
//! config section contributes one factory, and [`build_registry`] runs them
//! through [`ProviderRegistry::from_factories`].

pub mod google_books;
pub mod http;
pub mod open_library;

use std::sync::Arc;

use folio_metadata::{MetadataProvider, ProviderFactory, ProviderRegistry};

use crate::config::ProvidersConfig;

pub use google_books::{GOOGLE_BOOKS_ID, GoogleBooksProvider};
pub use open_library::{OPEN_LIBRARY_ID, OpenLibraryProvider};

/// Factories for every built-in provider.
///
/// Disabled providers are still constructed so they can be listed and
/// selected explicitly; they simply sit out default searches.
pub fn factories(config: &ProvidersConfig) -> Vec<ProviderFactory> {
    let open_library = config.open_library.clone();
    let google_books = config.google_books.clone();
    vec![
        Box::new(move || {
            OpenLibraryProvider::new(&open_library)
                .map(|p| Arc::new(p) as Arc<dyn MetadataProvider>)
        }),
        Box::new(move || {
            GoogleBooksProvider::new(&google_books)
                .map(|p| Arc::new(p) as Arc<dyn MetadataProvider>)
        }),
    ]
}

/// Build the registry of built-in providers.
pub fn build_registry(config: &ProvidersConfig) -> ProviderRegistry {
    let registry = ProviderRegistry::from_factories(factories(config));
    tracing::info!(
        providers = registry.len(),
        enabled = registry.enabled().len(),
        "metadata providers registered"
    );
    registry
}
