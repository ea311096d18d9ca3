//! Open Library search provider.
//!
//! Queries `GET {base_url}/search.json?q=..&limit=..&lang=..` and maps each
//! entry of `docs` to a [`MetadataRecord`].

use async_trait::async_trait;
use folio_metadata::{EnabledFlag, MetadataProvider, MetadataRecord, ProviderError, SourceInfo};
use serde::Deserialize;

use super::http::{build_client, endpoint, get_json};
use crate::config::HttpProviderConfig;

/// Source id reported by [`OpenLibraryProvider`].
pub const OPEN_LIBRARY_ID: &str = "openlibrary";

const COVERS_BASE_URL: &str = "https://covers.openlibrary.org/b/id";

/// Subjects beyond this many are dropped.
const MAX_TAGS: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Doc {
    key: String,
    title: Option<String>,
    author_name: Vec<String>,
    first_publish_year: Option<i32>,
    publisher: Vec<String>,
    language: Vec<String>,
    subject: Vec<String>,
    isbn: Vec<String>,
    cover_i: Option<i64>,
    ratings_average: Option<f64>,
}

/// Metadata provider backed by the Open Library search API.
pub struct OpenLibraryProvider {
    base_url: String,
    client: reqwest::Client,
    enabled: EnabledFlag,
}

impl OpenLibraryProvider {
    /// Create a provider from its config section.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Provider`] if the HTTP client cannot be built.
    pub fn new(config: &HttpProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client: build_client(config)?,
            enabled: EnabledFlag::new(config.enabled),
        })
    }

    fn to_record(&self, doc: Doc) -> Option<MetadataRecord> {
        let title = doc.title.filter(|t| !t.trim().is_empty())?;
        let work_id = doc.key.rsplit('/').next().unwrap_or_default().to_owned();

        let mut record = MetadataRecord::new(OPEN_LIBRARY_ID, work_id.clone(), title);
        record.authors = doc.author_name;
        if !doc.key.is_empty() {
            record.url = endpoint(&self.base_url, &doc.key);
        }
        record.cover_url = doc
            .cover_i
            .filter(|id| *id > 0)
            .map(|id| format!("{COVERS_BASE_URL}/{id}-L.jpg"));
        record.publisher = doc.publisher.into_iter().next();
        record.published_date = doc.first_publish_year.map(|y| y.to_string());
        record.rating = doc.ratings_average;
        record.languages = doc.language;
        record.tags = doc.subject.into_iter().take(MAX_TAGS).collect();
        if let Some(isbn) = doc.isbn.into_iter().next() {
            record.identifiers.insert("isbn".into(), isbn);
        }
        if !work_id.is_empty() {
            record.identifiers.insert(OPEN_LIBRARY_ID.into(), work_id);
        }
        Some(record)
    }
}

#[async_trait]
impl MetadataProvider for OpenLibraryProvider {
    fn source_info(&self) -> SourceInfo {
        SourceInfo::new(
            OPEN_LIBRARY_ID,
            "Open Library",
            "Open, editable library catalog from the Internet Archive",
            self.base_url.clone(),
        )
    }

    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    async fn search(
        &self,
        query: &str,
        locale: &str,
        max_results: usize,
    ) -> Result<Vec<MetadataRecord>, ProviderError> {
        if !self.is_enabled() || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        tracing::trace!(provider = OPEN_LIBRARY_ID, query, "searching");

        let limit = max_results.to_string();
        let request = self
            .client
            .get(endpoint(&self.base_url, "search.json"))
            .query(&[("q", query.trim()), ("limit", limit.as_str()), ("lang", locale)]);
        let response: SearchResponse = get_json(request).await?;

        Ok(response
            .docs
            .into_iter()
            .filter_map(|doc| self.to_record(doc))
            .take(max_results)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use folio_metadata::ProviderErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> OpenLibraryProvider {
        OpenLibraryProvider::new(&HttpProviderConfig::with_base_url(base_url)).unwrap()
    }

    fn hobbit_body() -> serde_json::Value {
        json!({
            "numFound": 2,
            "docs": [
                {
                    "key": "/works/OL27482W",
                    "title": "The Hobbit",
                    "author_name": ["J.R.R. Tolkien"],
                    "first_publish_year": 1937,
                    "publisher": ["George Allen & Unwin", "Houghton Mifflin"],
                    "language": ["eng"],
                    "subject": ["Fantasy", "Dragons"],
                    "isbn": ["9780261103573", "0261103571"],
                    "cover_i": 6979861,
                    "ratings_average": 4.25
                },
                { "key": "/works/OL1W" }
            ]
        })
    }

    #[tokio::test]
    async fn maps_docs_to_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "the hobbit"))
            .and(query_param("limit", "5"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hobbit_body()))
            .expect(1)
            .mount(&server)
            .await;

        let records = provider(&server.uri())
            .search("the hobbit", "en", 5)
            .await
            .unwrap();

        assert_eq!(records.len(), 1, "docs without a title are skipped");
        let hobbit = &records[0];
        assert_eq!(hobbit.source_id, "openlibrary");
        assert_eq!(hobbit.external_id, "OL27482W");
        assert_eq!(hobbit.title, "The Hobbit");
        assert_eq!(hobbit.authors, vec!["J.R.R. Tolkien".to_string()]);
        assert_eq!(hobbit.url, format!("{}/works/OL27482W", server.uri()));
        assert_eq!(
            hobbit.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/6979861-L.jpg")
        );
        assert_eq!(hobbit.publisher.as_deref(), Some("George Allen & Unwin"));
        assert_eq!(hobbit.published_date.as_deref(), Some("1937"));
        assert_eq!(hobbit.rating, Some(4.25));
        assert_eq!(hobbit.languages, vec!["eng".to_string()]);
        assert_eq!(hobbit.tags.len(), 2);
        assert_eq!(hobbit.isbn(), Some("9780261103573"));
        assert_eq!(
            hobbit.identifiers.get("openlibrary").map(String::as_str),
            Some("OL27482W")
        );
    }

    #[tokio::test]
    async fn disabled_provider_does_no_io() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hobbit_body()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider(&server.uri());
        provider.set_enabled(false);
        assert!(provider.search("the hobbit", "en", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_query_does_no_io() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hobbit_body()))
            .expect(0)
            .mount(&server)
            .await;

        assert!(provider(&server.uri()).search("   ", "en", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"docs": "nope"}"#))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .search("x", "en", 5)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Parse);
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .search("x", "en", 5)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Network);
    }

    #[test]
    fn source_info_reports_stable_id() {
        let info = provider("https://openlibrary.org/").source_info();
        assert_eq!(info.id, OPEN_LIBRARY_ID);
        assert_eq!(info.base_url, "https://openlibrary.org");
    }
}
