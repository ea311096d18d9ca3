//! Google Books volumes provider.
//!
//! Queries `GET {base_url}/volumes?q=..&maxResults=..&langRestrict=..` and
//! maps `items[].volumeInfo` to [`MetadataRecord`]s.

use async_trait::async_trait;
use folio_metadata::{EnabledFlag, MetadataProvider, MetadataRecord, ProviderError, SourceInfo};
use serde::Deserialize;

use super::http::{build_client, endpoint, get_json};
use crate::config::HttpProviderConfig;

/// Source id reported by [`GoogleBooksProvider`].
pub const GOOGLE_BOOKS_ID: &str = "googlebooks";

/// The API rejects larger page sizes.
const MAX_PAGE_SIZE: usize = 40;

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: String,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    industry_identifiers: Vec<IndustryIdentifier>,
    categories: Vec<String>,
    average_rating: Option<f64>,
    language: Option<String>,
    image_links: Option<ImageLinks>,
    info_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

/// Metadata provider backed by the Google Books volumes API.
pub struct GoogleBooksProvider {
    base_url: String,
    client: reqwest::Client,
    enabled: EnabledFlag,
}

impl GoogleBooksProvider {
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
}

fn to_record(volume: Volume) -> Option<MetadataRecord> {
    let info = volume.volume_info;
    let title = info.title.filter(|t| !t.trim().is_empty())?;
    let title = match info.subtitle.filter(|s| !s.trim().is_empty()) {
        Some(subtitle) => format!("{title}: {subtitle}"),
        None => title,
    };

    let mut record = MetadataRecord::new(GOOGLE_BOOKS_ID, volume.id.clone(), title);
    record.authors = info.authors;
    record.url = info.info_link.unwrap_or_default();
    record.cover_url = info
        .image_links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail));
    record.description = info.description;
    record.publisher = info.publisher;
    record.published_date = info.published_date;
    record.rating = info.average_rating;
    record.languages = info.language.into_iter().collect();
    record.tags = info.categories;

    for id in info.industry_identifiers {
        let key = match id.kind.as_str() {
            "ISBN_13" => "isbn13",
            "ISBN_10" => "isbn10",
            _ => continue,
        };
        record.identifiers.insert(key.into(), id.identifier);
    }
    let preferred = record
        .identifiers
        .get("isbn13")
        .or_else(|| record.identifiers.get("isbn10"))
        .cloned();
    if let Some(isbn) = preferred {
        record.identifiers.insert("isbn".into(), isbn);
    }
    record.identifiers.insert(GOOGLE_BOOKS_ID.into(), volume.id);
    Some(record)
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn source_info(&self) -> SourceInfo {
        SourceInfo::new(
            GOOGLE_BOOKS_ID,
            "Google Books",
            "Google Books volume search",
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
        tracing::trace!(provider = GOOGLE_BOOKS_ID, query, "searching");

        let page_size = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let request = self.client.get(endpoint(&self.base_url, "volumes")).query(&[
            ("q", query.trim()),
            ("maxResults", page_size.as_str()),
            ("langRestrict", locale),
        ]);
        let response: VolumesResponse = get_json(request).await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(to_record)
            .take(max_results)
            .collect())
    }
}
