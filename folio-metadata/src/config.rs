//! Aggregation configuration with sensible defaults.
//!
//! [`MetadataConfig`] controls scoring weights, the merge strategy, the
//! worker pool width and fetch behaviour. Every section deserialises with
//! defaults so a host can embed it in a partial TOML file and operators can
//! retune ranking without code changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::merge::MergeStrategy;

/// Top-level configuration for the aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Relevance/completeness scoring weights.
    pub scoring: ScoringConfig,
    /// How scored records are reduced to one.
    pub merge: MergeConfig,
    /// Fan-out worker pool settings.
    pub orchestrator: OrchestratorConfig,
    /// Fetch use-case settings.
    pub fetch: FetchConfig,
}

/// Scoring weights.
///
/// The completeness weights are added once per populated field; the match
/// weights reward agreement with the query. The sum is multiplied by the
/// per-provider weight and clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub title_weight: f64,
    pub authors_weight: f64,
    pub description_weight: f64,
    pub cover_weight: f64,
    pub identifiers_weight: f64,
    /// Multiplied by the title similarity ratio.
    pub title_match_weight: f64,
    /// Awarded in full when any query author matches any record author.
    pub author_match_weight: f64,
    /// Awarded in full when the normalised ISBNs are equal.
    pub isbn_match_weight: f64,
    /// Per-source multiplier keyed by `source_id`. Missing ids use 1.0.
    pub provider_weights: HashMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.1,
            authors_weight: 0.1,
            description_weight: 0.1,
            cover_weight: 0.1,
            identifiers_weight: 0.1,
            title_match_weight: 0.2,
            author_match_weight: 0.2,
            isbn_match_weight: 0.1,
            provider_weights: HashMap::new(),
        }
    }
}

impl ScoringConfig {
    /// Weight applied to records from `source_id`.
    pub fn provider_weight(&self, source_id: &str) -> f64 {
        self.provider_weights.get(source_id).copied().unwrap_or(1.0)
    }

    /// Set a per-provider weight.
    pub fn with_provider_weight(mut self, source_id: impl Into<String>, weight: f64) -> Self {
        self.provider_weights.insert(source_id.into(), weight);
        self
    }

    fn validate(&self) -> Result<(), MetadataError> {
        let named = [
            ("title_weight", self.title_weight),
            ("authors_weight", self.authors_weight),
            ("description_weight", self.description_weight),
            ("cover_weight", self.cover_weight),
            ("identifiers_weight", self.identifiers_weight),
            ("title_match_weight", self.title_match_weight),
            ("author_match_weight", self.author_match_weight),
            ("isbn_match_weight", self.isbn_match_weight),
        ];
        for (name, value) in named {
            check_weight(name, value)?;
        }
        for (id, value) in &self.provider_weights {
            check_weight(&format!("provider_weights.{id}"), *value)?;
        }
        Ok(())
    }
}

/// Merge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub strategy: MergeStrategy,
    /// `MergeBest` keeps records scoring at least this fraction of the best score.
    pub score_threshold_ratio: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::MergeBest,
            score_threshold_ratio: 0.8,
        }
    }
}

/// Fan-out settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of providers queried at once.
    pub max_workers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

/// Fetch use-case settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Providers used when a query does not name any. `None` runs every
    /// enabled provider.
    pub enabled_providers: Option<Vec<String>>,
    /// Optional overall deadline for one fetch, in seconds. Unset means the
    /// fetch waits for every provider to resolve.
    pub timeout_seconds: Option<u64>,
}

impl MetadataConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - every weight is finite and non-negative
    /// - `merge.score_threshold_ratio` is within `[0.0, 1.0]`
    /// - `orchestrator.max_workers` is greater than 0
    /// - `fetch.timeout_seconds`, when set, is greater than 0
    pub fn validate(&self) -> Result<(), MetadataError> {
        self.scoring.validate()?;
        let ratio = self.merge.score_threshold_ratio;
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(MetadataError::Config(
                "score_threshold_ratio must be between 0.0 and 1.0".into(),
            ));
        }
        if self.orchestrator.max_workers == 0 {
            return Err(MetadataError::Config(
                "max_workers must be greater than 0".into(),
            ));
        }
        if self.fetch.timeout_seconds == Some(0) {
            return Err(MetadataError::Config(
                "timeout_seconds must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }
}

fn check_weight(name: &str, value: f64) -> Result<(), MetadataError> {
    if !value.is_finite() || value < 0.0 {
        return Err(MetadataError::Config(format!(
            "{name} must be a finite, non-negative number"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = MetadataConfig::default();
        assert!((config.scoring.title_weight - 0.1).abs() < f64::EPSILON);
        assert!((config.scoring.title_match_weight - 0.2).abs() < f64::EPSILON);
        assert!((config.scoring.author_match_weight - 0.2).abs() < f64::EPSILON);
        assert!((config.scoring.isbn_match_weight - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.merge.strategy, MergeStrategy::MergeBest);
        assert!((config.merge.score_threshold_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.orchestrator.max_workers, 5);
        assert!(config.fetch.timeout_seconds.is_none());
        assert!(config.fetch.enabled_providers.is_none());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(MetadataConfig::default().validate().is_ok());
    }

    #[test]
    fn provider_weight_defaults_to_one() {
        let scoring = ScoringConfig::default().with_provider_weight("goodreads", 0.5);
        assert!((scoring.provider_weight("goodreads") - 0.5).abs() < f64::EPSILON);
        assert!((scoring.provider_weight("unknown") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = MetadataConfig::default();
        config.orchestrator.max_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn negative_weight_rejected() {
        let mut config = MetadataConfig::default();
        config.scoring.cover_weight = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cover_weight"));
    }

    #[test]
    fn nan_provider_weight_rejected() {
        let mut config = MetadataConfig::default();
        config.scoring = config.scoring.with_provider_weight("x", f64::NAN);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider_weights.x"));
    }

    #[test]
    fn threshold_ratio_out_of_range_rejected() {
        let mut config = MetadataConfig::default();
        config.merge.score_threshold_ratio = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("score_threshold_ratio"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = MetadataConfig::default();
        config.fetch.timeout_seconds = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: MetadataConfig = serde_json::from_str(
            r#"{"merge":{"strategy":"first_wins"},"scoring":{"provider_weights":{"a":0.7}}}"#,
        )
        .expect("deserialize");
        assert_eq!(config.merge.strategy, MergeStrategy::FirstWins);
        assert!((config.merge.score_threshold_ratio - 0.8).abs() < f64::EPSILON);
        assert!((config.scoring.provider_weight("a") - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.orchestrator.max_workers, 5);
    }
}
