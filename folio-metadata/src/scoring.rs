//! Relevance and completeness scoring for candidate records.
//!
//! Formula:
//!
//! ```text
//! completeness = Σ field_weight            for each populated field of
//!                                          title, authors, description,
//!                                          cover_url, identifiers
//! match        = title_match_weight  × similarity(query_title, title)
//!              + author_match_weight       if any author matches (case-insensitive)
//!              + isbn_match_weight         if normalised ISBNs are equal
//! score        = clamp((completeness + match) × provider_weight, 0.0, 1.0)
//! ```

use similar::TextDiff;

use crate::config::ScoringConfig;
use crate::types::{normalize_isbn, MetadataQuery, MetadataRecord, ScoredMetadataRecord};

/// Scores records against a query using configurable weights.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    /// Create a scorer with the given weights.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one record. Always returns a value in `[0.0, 1.0]`.
    pub fn score(
        &self,
        record: &MetadataRecord,
        query_title: Option<&str>,
        query_authors: &[&str],
        query_isbn: Option<&str>,
    ) -> f64 {
        let raw = self.completeness(record)
            + self.match_quality(record, query_title, query_authors, query_isbn);
        let weighted = raw * self.config.provider_weight(&record.source_id);
        if weighted.is_nan() {
            return 0.0;
        }
        weighted.clamp(0.0, 1.0)
    }

    /// Score every record against a structured query.
    pub fn score_all(
        &self,
        records: Vec<MetadataRecord>,
        query: &MetadataQuery,
    ) -> Vec<ScoredMetadataRecord> {
        let title = query.title_term();
        let authors = query.author_terms();
        let isbn = query.isbn_term();
        records
            .into_iter()
            .map(|record| {
                let score = self.score(&record, title, &authors, isbn.as_deref());
                tracing::trace!(
                    source = %record.source_id,
                    external_id = %record.external_id,
                    score,
                    "scored record"
                );
                ScoredMetadataRecord::new(record, score)
            })
            .collect()
    }

    fn completeness(&self, record: &MetadataRecord) -> f64 {
        let c = &self.config;
        let mut total = 0.0;
        if !record.title.trim().is_empty() {
            total += c.title_weight;
        }
        if record.authors.iter().any(|a| !a.trim().is_empty()) {
            total += c.authors_weight;
        }
        if is_present(record.description.as_deref()) {
            total += c.description_weight;
        }
        if is_present(record.cover_url.as_deref()) {
            total += c.cover_weight;
        }
        if !record.identifiers.is_empty() {
            total += c.identifiers_weight;
        }
        total
    }

    fn match_quality(
        &self,
        record: &MetadataRecord,
        query_title: Option<&str>,
        query_authors: &[&str],
        query_isbn: Option<&str>,
    ) -> f64 {
        let c = &self.config;
        let mut total = 0.0;

        if let Some(title) = query_title {
            total += c.title_match_weight * title_similarity(title, &record.title);
        }

        if authors_match(query_authors, &record.authors) {
            total += c.author_match_weight;
        }

        if let (Some(wanted), Some(stored)) = (query_isbn, record.isbn()) {
            let wanted = normalize_isbn(wanted);
            if !wanted.is_empty() && wanted == normalize_isbn(stored) {
                total += c.isbn_match_weight;
            }
        }

        total
    }
}

/// Case-insensitive similarity ratio in `[0.0, 1.0]`.
///
/// Uses the character-level diff ratio (`2 × matches / total length`).
/// Blank input on either side scores 0.0.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let ratio = f64::from(TextDiff::from_chars(a.as_str(), b.as_str()).ratio());
    ratio.clamp(0.0, 1.0)
}

fn authors_match(query_authors: &[&str], record_authors: &[String]) -> bool {
    query_authors.iter().any(|wanted| {
        let wanted = wanted.trim().to_lowercase();
        !wanted.is_empty()
            && record_authors
                .iter()
                .any(|have| have.trim().to_lowercase() == wanted)
    })
}

fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record(source: &str) -> MetadataRecord {
        let mut record = MetadataRecord::new(source, "ext-1", "Test Book");
        record.authors = vec!["Test Author".into()];
        record.description = Some("A book used in tests.".into());
        record.cover_url = Some("https://covers.example/1.jpg".into());
        record.identifiers.insert("isbn".into(), "1234567890".into());
        record
    }

    #[test]
    fn exact_match_scores_full() {
        let scorer = Scorer::default();
        let score = scorer.score(
            &full_record("a"),
            Some("Test Book"),
            &["test author"],
            Some("123-456-789-0"),
        );
        // 0.5 completeness + 0.2 + 0.2 + 0.1 match = 1.0
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn completeness_only_without_query() {
        let scorer = Scorer::default();
        let score = scorer.score(&full_record("a"), None, &[], None);
        assert!((score - 0.5).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn empty_record_and_query_scores_zero() {
        let scorer = Scorer::default();
        let score = scorer.score(&MetadataRecord::default(), None, &[], None);
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn unrelated_record_scores_low() {
        let scorer = Scorer::default();
        let mut record = MetadataRecord::new("b", "x", "Gardening for Absolute Beginners");
        record.tags = vec!["gardening".into()];
        let score = scorer.score(&record, Some("Test Book"), &["Test Author"], Some("1234567890"));
        assert!(score < 0.3, "got {score}");
    }

    #[test]
    fn provider_weight_applied_last() {
        let scorer = Scorer::new(ScoringConfig::default().with_provider_weight("weak", 0.5));
        let score = scorer.score(&full_record("weak"), None, &[], None);
        assert!((score - 0.25).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn score_clamped_to_one() {
        let scorer = Scorer::new(ScoringConfig::default().with_provider_weight("strong", 3.0));
        let score = scorer.score(&full_record("strong"), Some("Test Book"), &[], None);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn oversized_weights_still_clamped() {
        let config = ScoringConfig {
            title_weight: 50.0,
            ..Default::default()
        };
        let scorer = Scorer::new(config);
        let score = scorer.score(&full_record("a"), None, &[], None);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn isbn_mismatch_earns_nothing() {
        let scorer = Scorer::default();
        let with = scorer.score(&full_record("a"), None, &[], Some("1234567890"));
        let without = scorer.score(&full_record("a"), None, &[], Some("0987654321"));
        assert!((with - without - 0.1).abs() < 1e-9);
    }

    #[test]
    fn whitespace_only_fields_do_not_count() {
        let scorer = Scorer::default();
        let mut record = MetadataRecord::new("a", "1", "   ");
        record.authors = vec![" ".into()];
        record.description = Some("".into());
        assert!(scorer.score(&record, None, &[], None).abs() < f64::EPSILON);
    }

    #[test]
    fn title_similarity_bounds() {
        assert!((title_similarity("Dune", "dune") - 1.0).abs() < f64::EPSILON);
        assert!(title_similarity("", "dune").abs() < f64::EPSILON);
        let partial = title_similarity("Dune Messiah", "Dune");
        assert!(partial > 0.0 && partial < 1.0, "got {partial}");
    }

    #[test]
    fn score_all_uses_query_terms() {
        let scorer = Scorer::default();
        let query = MetadataQuery {
            title: Some("Test Book".into()),
            authors: vec!["Test Author".into()],
            isbn: Some("1234567890".into()),
            ..Default::default()
        };
        let scored = scorer.score_all(vec![full_record("a"), MetadataRecord::default()], &query);
        assert_eq!(scored.len(), 2);
        assert!(scored[0].score > 0.8);
        assert!(scored[1].score < 0.3);
    }
}
