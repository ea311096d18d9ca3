//! Core value types: source descriptors, records, queries and scored records.
//!
//! Everything here lives only for the duration of one fetch or search call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default locale used when a query does not specify one.
pub const DEFAULT_LOCALE: &str = "en";

/// Default number of records each provider is asked for.
pub const DEFAULT_MAX_RESULTS_PER_PROVIDER: usize = 5;

/// Static description of a metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Stable short identifier, unique per provider (e.g. `"openlibrary"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// One-line description of the source.
    pub description: String,
    /// Base URL the provider talks to.
    pub base_url: String,
}

impl SourceInfo {
    /// Create a new source descriptor.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            base_url: base_url.into(),
        }
    }
}

/// Bibliographic metadata for one work, as reported by a single source.
///
/// Providers produce these; the orchestrator passes them through untouched
/// and only the merger builds new ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    /// Id of the provider that produced this record.
    pub source_id: String,
    /// The source's own identifier for the work.
    pub external_id: String,
    pub title: String,
    /// Authors in source order.
    pub authors: Vec<String>,
    /// Canonical page for the work at the source.
    pub url: String,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub publisher: Option<String>,
    /// Publication date in whatever format the source uses.
    pub published_date: Option<String>,
    /// Rating on a 0..5 scale.
    pub rating: Option<f64>,
    pub languages: Vec<String>,
    pub tags: Vec<String>,
    /// Identifier type to value, e.g. `isbn -> 9780261103573`.
    pub identifiers: BTreeMap<String, String>,
}

impl MetadataRecord {
    /// Create a record with the three fields every source supplies.
    pub fn new(
        source_id: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            external_id: external_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Returns the stored ISBN, preferring `isbn`, then `isbn13`, then `isbn10`.
    pub fn isbn(&self) -> Option<&str> {
        ["isbn", "isbn13", "isbn10"]
            .iter()
            .find_map(|key| self.identifiers.get(*key))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// A structured request for the metadata of one work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataQuery {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub isbn: Option<String>,
    /// Locale hint passed to every provider.
    pub locale: String,
    pub max_results_per_provider: usize,
    /// Restricts which providers run. `None` means every enabled provider.
    pub provider_ids: Option<Vec<String>>,
}

impl Default for MetadataQuery {
    fn default() -> Self {
        Self {
            title: None,
            authors: Vec::new(),
            isbn: None,
            locale: DEFAULT_LOCALE.to_owned(),
            max_results_per_provider: DEFAULT_MAX_RESULTS_PER_PROVIDER,
            provider_ids: None,
        }
    }
}

impl MetadataQuery {
    /// Query by title.
    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Query by ISBN.
    pub fn by_isbn(isbn: impl Into<String>) -> Self {
        Self {
            isbn: Some(isbn.into()),
            ..Default::default()
        }
    }

    /// Add an author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    /// Restrict the query to the given providers.
    pub fn with_providers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provider_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Non-blank title, if any.
    pub fn title_term(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    /// Non-blank authors.
    pub fn author_terms(&self) -> Vec<&str> {
        self.authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// Normalised ISBN, if one was given and survives normalisation.
    pub fn isbn_term(&self) -> Option<String> {
        non_blank(self.isbn.as_deref())
            .map(normalize_isbn)
            .filter(|isbn| !isbn.is_empty())
    }

    /// Returns `true` if the query carries at least one usable search term.
    pub fn has_search_terms(&self) -> bool {
        self.title_term().is_some() || !self.author_terms().is_empty() || self.isbn_term().is_some()
    }

    /// Builds the free-text query handed to providers.
    ///
    /// An ISBN wins outright; otherwise the title followed by the authors.
    pub fn search_text(&self) -> String {
        if let Some(isbn) = self.isbn_term() {
            return isbn;
        }
        let mut parts: Vec<&str> = Vec::new();
        if let Some(title) = self.title_term() {
            parts.push(title);
        }
        parts.extend(self.author_terms());
        parts.join(" ")
    }
}

/// A record paired with its relevance/completeness score in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMetadataRecord {
    pub record: MetadataRecord,
    pub score: f64,
}

impl ScoredMetadataRecord {
    pub fn new(record: MetadataRecord, score: f64) -> Self {
        Self { record, score }
    }
}

/// Strips everything but digits and `X`, uppercasing the check digit.
///
/// `"978-0-261-10357-3"` and `"9780261103573"` normalise equal.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x' || *c == 'X')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_has_no_terms() {
        let query = MetadataQuery::default();
        assert_eq!(query.locale, "en");
        assert_eq!(query.max_results_per_provider, 5);
        assert!(!query.has_search_terms());
    }

    #[test]
    fn blank_fields_are_not_terms() {
        let query = MetadataQuery {
            title: Some("   ".into()),
            authors: vec!["".into(), " ".into()],
            isbn: Some("--".into()),
            ..Default::default()
        };
        assert!(!query.has_search_terms());
        assert_eq!(query.search_text(), "");
    }

    #[test]
    fn author_only_query_has_terms() {
        let query = MetadataQuery::default().with_author("Ursula K. Le Guin");
        assert!(query.has_search_terms());
        assert_eq!(query.search_text(), "Ursula K. Le Guin");
    }

    #[test]
    fn search_text_prefers_isbn() {
        let query = MetadataQuery {
            title: Some("The Hobbit".into()),
            isbn: Some("978-0-261-10357-3".into()),
            ..Default::default()
        };
        assert_eq!(query.search_text(), "9780261103573");
    }

    #[test]
    fn search_text_joins_title_and_authors() {
        let query = MetadataQuery::by_title(" The Dispossessed ")
            .with_author("Ursula K. Le Guin")
            .with_author("");
        assert_eq!(query.search_text(), "The Dispossessed Ursula K. Le Guin");
    }

    #[test]
    fn normalize_isbn_strips_separators() {
        assert_eq!(normalize_isbn("0-306-40615-x"), "030640615X");
        assert_eq!(normalize_isbn("ISBN 978 0 261"), "9780261");
        assert_eq!(normalize_isbn(""), "");
    }

    #[test]
    fn record_isbn_lookup_order() {
        let mut record = MetadataRecord::new("src", "1", "Title");
        assert_eq!(record.isbn(), None);
        record.identifiers.insert("isbn10".into(), "0306406152".into());
        assert_eq!(record.isbn(), Some("0306406152"));
        record.identifiers.insert("isbn".into(), "9780306406157".into());
        assert_eq!(record.isbn(), Some("9780306406157"));
    }

    #[test]
    fn query_deserializes_partial_json() {
        let query: MetadataQuery =
            serde_json::from_str(r#"{"title":"Dune","authors":["Frank Herbert"]}"#)
                .expect("deserialize");
        assert_eq!(query.title.as_deref(), Some("Dune"));
        assert_eq!(query.locale, "en");
        assert!(query.provider_ids.is_none());
    }

    #[test]
    fn record_deserializes_with_missing_fields() {
        let record: MetadataRecord =
            serde_json::from_str(r#"{"source_id":"x","title":"Dune"}"#).expect("deserialize");
        assert_eq!(record.title, "Dune");
        assert!(record.authors.is_empty());
        assert!(record.rating.is_none());
    }
}
